use super::*;
use crate::session::{PageNode, Session};
use crate::store::{MemoryStore, CURRENT_SESSION_KEY};
use serde_json::{json, Map};
use std::time::Duration;

fn setup() -> (MindMapApp, Arc<dyn KeyValueStore>) {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let app = MindMapApp::build(store.clone(), "memory".into(), Settings::default(), None);
    (app, store)
}

fn two_page_session() -> Session {
    let mut session = Session::empty();
    session.add_node_if_missing(PageNode::new("http://a.com/", "A"));
    session.add_node_if_missing(PageNode::new("http://b.com/", "B"));
    session
}

/// The watcher thread forwards asynchronously
fn wait_for_changes(app: &mut MindMapApp) {
    for _ in 0..200 {
        if app.poll_store_changes() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("store change never reached the app");
}

fn canvas() -> Rect {
    Rect::from_min_size(Pos2::ZERO, INITIAL_CANVAS)
}

fn screen_pos(app: &MindMapApp, id: &str) -> Pos2 {
    let pos = app.graph.get_pos(id).unwrap();
    app.viewport.to_screen(canvas(), pos)
}

fn click(app: &mut MindMapApp, at: Pos2) {
    let hit = app.hit_test(canvas(), at);
    if let Some(action) = app.gestures.press(hit, at) {
        app.apply_pointer(action, canvas());
    }
    if let Some(action) = app.gestures.release() {
        app.apply_pointer(action, canvas());
    }
}

#[test]
fn store_writes_reach_the_map() {
    let (mut app, store) = setup();
    assert!(app.graph.nodes.is_empty());

    GraphStore::new(store).replace(&two_page_session()).unwrap();
    wait_for_changes(&mut app);

    assert_eq!(app.graph.nodes.len(), 2);
    assert_eq!(app.store_error, None);
}

#[test]
fn toggle_starts_a_fresh_session() {
    let (mut app, store) = setup();
    GraphStore::new(store).replace(&two_page_session()).unwrap();
    wait_for_changes(&mut app);

    app.toggle_session();
    assert_eq!(app.session_state, SessionState::Active);
    wait_for_changes(&mut app);
    assert!(app.graph.nodes.is_empty());

    app.toggle_session();
    assert_eq!(app.session_state, SessionState::Inactive);
}

#[test]
fn click_opens_notes_and_save_persists() {
    let (mut app, store) = setup();
    let graph = GraphStore::new(store);
    graph.replace(&two_page_session()).unwrap();
    wait_for_changes(&mut app);

    let at = screen_pos(&app, "http://a.com/");
    click(&mut app, at);

    let panel = app.annotation.as_mut().expect("panel should open");
    assert_eq!(panel.node_id, "http://a.com/");
    assert_eq!(app.graph.selected_node.as_deref(), Some("http://a.com/"));

    if let Some(panel) = app.annotation.as_mut() {
        panel.text = "compare with b".into();
    }
    app.save_annotation();

    assert!(app.annotation.is_none());
    assert_eq!(app.graph.selected_node, None);
    let saved = graph.load().unwrap();
    assert_eq!(saved.node("http://a.com/").unwrap().notes, "compare with b");
}

#[test]
fn close_discards_the_edit() {
    let (mut app, store) = setup();
    let graph = GraphStore::new(store);
    graph.replace(&two_page_session()).unwrap();
    wait_for_changes(&mut app);

    let at = screen_pos(&app, "http://b.com/");
    click(&mut app, at);
    if let Some(panel) = app.annotation.as_mut() {
        panel.text = "never saved".into();
    }
    app.close_annotation();

    assert!(app.annotation.is_none());
    assert_eq!(graph.load().unwrap().node("http://b.com/").unwrap().notes, "");
}

#[test]
fn dragging_a_node_does_not_open_notes() {
    let (mut app, store) = setup();
    GraphStore::new(store).replace(&two_page_session()).unwrap();
    wait_for_changes(&mut app);

    let at = screen_pos(&app, "http://a.com/");
    let hit = app.hit_test(canvas(), at);
    assert_eq!(hit.as_deref(), Some("http://a.com/"));

    let press = app.gestures.press(hit, at).unwrap();
    app.apply_pointer(press, canvas());
    assert_eq!(app.graph.alpha_target, app.layout.drag_alpha_target);

    let target = at + Vec2::new(40.0, 0.0);
    let drag = app.gestures.move_to(target).unwrap();
    app.apply_pointer(drag, canvas());
    assert_eq!(
        app.graph.get_node("http://a.com/").and_then(|n| n.pinned),
        Some(app.viewport.to_graph(canvas(), target))
    );

    let release = app.gestures.release().unwrap();
    app.apply_pointer(release, canvas());
    assert!(app.annotation.is_none());
    assert_eq!(app.graph.alpha_target, 0.0);
    assert_eq!(app.graph.get_node("http://a.com/").and_then(|n| n.pinned), None);
}

#[test]
fn empty_canvas_drag_pans_the_view() {
    let (mut app, _) = setup();
    let start = Pos2::new(5.0, 5.0);

    assert_eq!(app.hit_test(canvas(), start), None);
    app.gestures.press(None, start);
    let pan = app.gestures.move_to(start + Vec2::new(10.0, 20.0)).unwrap();
    app.apply_pointer(pan, canvas());

    assert_eq!(app.viewport.pan, Vec2::new(10.0, 20.0));
}

#[test]
fn malformed_session_keeps_the_last_good_graph() {
    let (mut app, store) = setup();
    GraphStore::new(store.clone()).replace(&two_page_session()).unwrap();
    wait_for_changes(&mut app);

    let mut record = Map::new();
    record.insert(CURRENT_SESSION_KEY.to_string(), json!(42));
    store.set(record).unwrap();
    wait_for_changes(&mut app);

    assert!(app.store_error.is_some());
    assert_eq!(app.graph.nodes.len(), 2);
}

#[test]
fn tooltip_shows_title_url_and_first_note_line() {
    let mut state = GraphState::with_seed(INITIAL_CANVAS, 1);
    let mut session = Session::empty();
    let mut page = PageNode::new("http://a.com/", "Page A");
    page.notes = "\n  first line\nsecond line".into();
    session.add_node_if_missing(page);
    state.load(&session);

    let text = tooltip_text(&state.nodes[0]);
    assert_eq!(text, "Page A\nhttp://a.com/\n\nfirst line");
}
