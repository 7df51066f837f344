use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;

use vn_stage::{
    config::StageConfig,
    engine::{
        Engine,
        animation::ShakingAnimation,
        dialog::{Progress, Script},
        loader::MemoryLoader,
        nodes::{Node, NodeOptions, Origin, TextContent},
        scene::{Scene, SceneEvent},
        textbox::Textbox,
    },
    types::{Color, DrawCommand, Point, Rect, TextAlign, percent},
};

fn engine() -> Engine {
    let mut engine = Engine::new(StageConfig::default(), Box::new(MemoryLoader::new()));
    engine.set_textbox(Textbox::opened());
    engine
}

fn sized(x: f64, y: f64) -> NodeOptions {
    NodeOptions {
        x,
        y,
        width: 20.0,
        height: 20.0,
        ..NodeOptions::default()
    }
}

#[test_log::test]
fn absolute_position_follows_a_moving_ancestor() -> Result<()> {
    let mut engine = engine();
    let mut scene = Scene::new("chain");
    let root = scene.add(Node::boxed(sized(100.0, 100.0)));
    let middle = scene.spawn(Node::boxed(sized(10.0, -20.0)));
    let leaf = scene.spawn(Node::boxed(sized(1.0, 2.0)));
    scene.add_child(root, middle)?;
    scene.add_child(middle, leaf)?;
    scene.get_mut(root)?.on_update(|node, frame| node.props.position.x += frame.delta);
    engine.set_scene(scene)?;

    engine.tick(0.0)?;
    engine.tick(16.0)?;
    let scene = engine.scene().expect("scene installed");
    assert_eq!(scene.get(root)?.props.position, Point::new(116.0, 100.0));
    assert_eq!(scene.get(leaf)?.absolute(), Point::new(127.0, 82.0));
    Ok(())
}

#[test_log::test]
fn switching_scenes_unloads_listeners_before_the_next_scene_starts() -> Result<()> {
    let token = Rc::new(());
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut first = Scene::new("first");
    for i in 0..3 {
        let id = first.add(Node::boxed(sized(i as f64 * 30.0, 0.0)));
        let held = token.clone();
        first.add_on_click(id, move |_, _, _| {
            let _ = &held;
            Ok(())
        })?;
    }
    assert_eq!(first.listener_count(), 3);
    assert_eq!(Rc::strong_count(&token), 4);

    let exit_log = log.clone();
    first.on(SceneEvent::ExitTransition, move |scene, _| {
        exit_log.borrow_mut().push(format!("exit {} listeners", scene.listener_count()));
        Ok(())
    });

    let mut second = Scene::new("second");
    let init_log = log.clone();
    let watcher = Rc::downgrade(&token);
    second.on(SceneEvent::Initialization, move |scene, _| {
        init_log.borrow_mut().push(format!(
            "init {} nodes, {} live listeners",
            scene.len(),
            watcher.strong_count() - 1
        ));
        Ok(())
    });

    first.set_dialog_list(vec![]);
    let mut pending = Some(second);
    first.on(SceneEvent::Finished, move |_, ctx| {
        if let Some(next) = pending.take() {
            ctx.request_scene(next);
        }
        Ok(())
    });

    let mut engine = engine();
    // Starting `first` reaches the end of its empty dialog at once, which
    // requests the switch.
    engine.set_scene(first)?;

    assert_eq!(engine.scene().map(Scene::name), Some("second"));
    assert_eq!(*log.borrow(), ["exit 3 listeners", "init 0 nodes, 0 live listeners"]);
    assert_eq!(Rc::strong_count(&token), 1);
    Ok(())
}

#[test_log::test]
fn clicks_reach_listeners_before_dialog_advances() -> Result<()> {
    let mut engine = engine();
    let mut scene = Scene::new("clicks");
    let button = scene.add(Node::boxed(NodeOptions {
        origin: Origin::new(percent(50.0), percent(50.0)),
        ..sized(100.0, 100.0)
    }));
    let log = Rc::new(RefCell::new(Vec::new()));
    let on_click = log.clone();
    scene.add_on_click(button, move |scene, ctx, id| {
        on_click.borrow_mut().push(format!("click at step {:?}", scene.dialog_position()));
        scene.get_mut(id)?.set_animation(ShakingAnimation::default()).start_animation(ctx.now());
        Ok(())
    })?;
    scene.set_dialog_list(vec![Script::new().into(), Script::new().into()]);
    engine.set_scene(scene)?;
    engine.tick(0.0)?;

    // Edges are inclusive: the node spans 90..=110 on both axes.
    assert_eq!(engine.click(Point::new(110.0, 90.0))?, Some(Progress::Advanced(1)));
    assert_eq!(engine.click(Point::new(111.0, 90.0))?, Some(Progress::Finished));
    assert_eq!(*log.borrow(), ["click at step Some(1)"]);
    assert!(engine.scene().expect("scene installed").get(button)?.animation_running());
    Ok(())
}

#[test_log::test]
fn layers_decide_draw_order_and_the_textbox_draws_last() -> Result<()> {
    let mut engine = engine();
    let mut scene = Scene::new("layers");
    scene.add(Node::boxed(NodeOptions {
        layer: 5,
        color: Some(Color::WHITE),
        ..sized(0.0, 0.0)
    }));
    scene.add(Node::boxed(NodeOptions {
        layer: -1,
        color: Some(Color::from(0xff0000)),
        ..sized(0.0, 0.0)
    }));
    scene.set_dialog_list(vec![Script::new().display("hi").into()]);
    engine.set_scene(scene)?;
    engine.tick(0.0)?;

    let fills: Vec<Color> = engine
        .commands()
        .iter()
        .filter_map(|c| match c {
            DrawCommand::FillRect { rect, color } if *rect == Rect::new(0.0, 0.0, 20.0, 20.0) => Some(*color),
            _ => None,
        })
        .collect();
    assert_eq!(fills, [Color::rgb(255, 0, 0), Color::WHITE]);
    assert!(matches!(engine.commands().last(), Some(DrawCommand::FillText { text, .. }) if text == "h"));
    Ok(())
}

#[test_log::test]
fn text_nodes_draw_with_their_configured_font() -> Result<()> {
    let mut engine = engine();
    let mut scene = Scene::new("credits");
    scene.add(Node::text(
        NodeOptions::tagged("title"),
        TextContent::new("Thanks").with_font_size(32.0).with_align(TextAlign::Center),
    ));
    engine.set_scene(scene)?;
    engine.tick(0.0)?;

    let font = engine
        .commands()
        .iter()
        .find_map(|c| match c {
            DrawCommand::FillText { text, font, .. } if text == "Thanks" => Some(font.clone()),
            _ => None,
        })
        .expect("title drawn");
    assert_eq!(font.size, 32.0);
    assert_eq!(font.align, TextAlign::Center);
    Ok(())
}
