use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;

use vn_stage::{
    config::StageConfig,
    engine::{
        Engine,
        dialog::{DialogEvent, DialogStep, Progress, Script},
        loader::MemoryLoader,
        nodes::{ImageState, MoveTo, Node, NodeOptions, say},
        scene::Scene,
        textbox::Textbox,
    },
    error::StageError,
    types::{Color, Point},
};

fn engine_with(loader: MemoryLoader) -> Engine {
    let mut engine = Engine::new(StageConfig::default(), Box::new(loader));
    engine.set_textbox(Textbox::opened());
    engine
}

/// Tick every 16ms from `from` up to and including `to`.
fn run(engine: &mut Engine, from: f64, to: f64) -> Result<()> {
    let mut t = from;
    while t <= to {
        engine.tick(t)?;
        t += 16.0;
    }
    Ok(())
}

#[test_log::test]
fn line_reveals_fully_then_advances() -> Result<()> {
    let mut engine = engine_with(MemoryLoader::new());
    let mut scene = Scene::new("hello");
    scene.set_dialog_list(vec![
        Script::new().display("Hi there").into(),
        Script::new().display("Next line").into(),
    ]);
    engine.set_scene(scene)?;

    run(&mut engine, 0.0, 320.0)?;
    let textbox = engine.textbox().expect("textbox attached");
    assert!(textbox.finished());
    assert_eq!(textbox.revealed(), 8);
    assert_eq!(textbox.visible_text(), "Hi there");

    assert_eq!(engine.progress_dialog()?, Progress::Advanced(1));
    assert_eq!(engine.textbox().map(Textbox::revealed), Some(0));
    Ok(())
}

#[test_log::test]
fn click_mid_reveal_fast_forwards_without_moving_the_cursor() -> Result<()> {
    let mut engine = engine_with(MemoryLoader::new());
    let mut scene = Scene::new("skip");
    scene.set_dialog_list(vec![
        Script::new().display("A rather long line of text").into(),
        Script::new().display("Second").into(),
    ]);
    engine.set_scene(scene)?;
    run(&mut engine, 0.0, 32.0)?;

    assert_eq!(engine.click(Point::new(10.0, 10.0))?, Some(Progress::FastForwarded));
    assert!(engine.textbox().is_some_and(Textbox::finished));
    assert_eq!(engine.scene().and_then(Scene::dialog_position), Some(1));

    assert_eq!(engine.click(Point::new(10.0, 10.0))?, Some(Progress::Advanced(1)));
    Ok(())
}

#[test_log::test]
fn sequential_moves_resolve_once_in_order() -> Result<()> {
    let mut engine = engine_with(MemoryLoader::new());
    let mut scene = Scene::new("moves");
    let node = scene.add(Node::boxed(NodeOptions::tagged("walker")));
    let log = Rc::new(RefCell::new(Vec::new()));
    let (first, second) = (log.clone(), log.clone());

    scene.set_dialog_list(vec![
        Script::new()
            .move_to(node, MoveTo::x(100.0).delay_steps(5))
            .then(move |scene, _, _| {
                first.borrow_mut().push(("x", scene.get(node)?.props.position));
                Ok(())
            })
            .move_to(node, MoveTo::y(-50.0).delay_steps(3).after(40.0))
            .then(move |scene, _, _| {
                second.borrow_mut().push(("y", scene.get(node)?.props.position));
                Ok(())
            })
            .into(),
    ]);
    engine.set_scene(scene)?;
    run(&mut engine, 0.0, 2000.0)?;

    assert_eq!(
        *log.borrow(),
        [("x", Point::new(100.0, 0.0)), ("y", Point::new(100.0, -50.0))]
    );
    let scene = engine.scene().expect("scene installed");
    assert_eq!(scene.running_scripts(), 0);
    assert!(!scene.get(node)?.is_moving());
    Ok(())
}

#[test_log::test]
fn stale_scripts_can_bail_out() -> Result<()> {
    let mut engine = engine_with(MemoryLoader::new());
    let mut scene = Scene::new("stale");
    let hits = Rc::new(RefCell::new(Vec::new()));
    let seen: Rc<RefCell<Option<DialogEvent>>> = Rc::default();

    let stale = hits.clone();
    let slot = seen.clone();
    let fresh = hits.clone();
    scene.set_dialog_list(vec![
        DialogStep::new(move |event| {
            *slot.borrow_mut() = Some(event.clone());
            let stale = stale.clone();
            Script::new().wait(100.0).unless_proceeded().then(move |_, _, _| {
                stale.borrow_mut().push("first");
                Ok(())
            })
        }),
        Script::new()
            .wait(100.0)
            .unless_proceeded()
            .then(move |_, _, _| {
                fresh.borrow_mut().push("second");
                Ok(())
            })
            .into(),
    ]);
    engine.set_scene(scene)?;

    // Advance before the first step's delay elapses.
    assert_eq!(engine.progress_dialog()?, Progress::Advanced(1));
    assert!(seen.borrow().as_ref().is_some_and(DialogEvent::has_proceeded));

    run(&mut engine, 0.0, 400.0)?;
    assert_eq!(*hits.borrow(), ["second"]);
    Ok(())
}

#[test_log::test]
fn failed_sprite_load_halts_only_that_script() -> Result<()> {
    let loader = MemoryLoader::new();
    let handle = loader.clone();
    handle.hold("broken.png");
    handle.hold("cheer.png");

    let mut engine = engine_with(loader);
    let mut scene = Scene::new("sprites");
    let broken = scene.add(Node::sprite(NodeOptions::default(), None, None));
    let cheer = scene.add(Node::sprite(NodeOptions::default(), None, None));
    let log = Rc::new(RefCell::new(Vec::new()));
    let (after_broken, after_cheer) = (log.clone(), log.clone());

    scene.set_dialog_list(vec![
        Script::new()
            .set_sprite(broken, "broken.png", None)
            .then(move |_, _, _| {
                after_broken.borrow_mut().push("broken loaded");
                Ok(())
            })
            .into(),
        Script::new()
            .set_sprite(cheer, "cheer.png", Some(50.0))
            .then(move |_, _, _| {
                after_cheer.borrow_mut().push("cheer loaded");
                Ok(())
            })
            .into(),
    ]);
    engine.set_scene(scene)?;
    engine.progress_dialog()?;
    assert_eq!(handle.requested(), ["broken.png", "cheer.png"]);

    run(&mut engine, 0.0, 100.0)?;
    assert_eq!(engine.scene().map(Scene::running_scripts), Some(2));

    handle.fail("broken.png", "corrupt header");
    handle.resolve("cheer.png", 200, 400);
    run(&mut engine, 116.0, 200.0)?;

    assert_eq!(*log.borrow(), ["cheer loaded"]);
    let scene = engine.scene().expect("scene installed");
    assert_eq!(scene.running_scripts(), 0);
    let state = scene.get(broken)?.kind.sprite().map(|s| s.state().clone());
    assert_eq!(state, Some(ImageState::Failed("corrupt header".into())));
    let sprite = scene.get(cheer)?.kind.sprite().cloned().expect("cheer is a sprite");
    assert_eq!(sprite.ratio, Some(50.0));
    assert!(sprite.is_loaded());

    // The dialog itself keeps going.
    assert_eq!(engine.progress_dialog()?, Progress::Finished);
    Ok(())
}

#[test_log::test]
fn say_titles_the_line_with_the_speaker() -> Result<()> {
    let mut engine = engine_with(MemoryLoader::new());
    let mut scene = Scene::new("say");
    let ion = scene.add(Node::character(
        NodeOptions {
            color: Some(Color::from(0x0056a2)),
            ..NodeOptions::default()
        },
        "Ionchan",
        None,
        None,
    ));
    scene.set_dialog_list(vec![say(ion, "Hello!")]);
    engine.set_scene(scene)?;

    let textbox = engine.textbox().expect("textbox attached");
    let title = textbox.title().expect("title set");
    assert_eq!(title.text, "Ionchan");
    assert_eq!(title.style.bold, Some(true));
    assert_eq!(title.style.color, Some(Color::rgb(0x00, 0x56, 0xa2)));
    assert_eq!(textbox.reveal_max(), 6);
    Ok(())
}

#[test_log::test]
fn uncolored_speakers_get_the_default_title_color() -> Result<()> {
    let mut engine = engine_with(MemoryLoader::new());
    let mut scene = Scene::new("say");
    let guest = scene.add(Node::character(NodeOptions::default(), "Guest", None, None));
    let red = scene.add(Node::character(
        NodeOptions {
            color: Some(Color::rgb(0xff, 0, 0)),
            ..NodeOptions::default()
        },
        "Red",
        None,
        None,
    ));
    scene.set_dialog_list(vec![say(guest, "Hi."), say(red, "Hey.")]);
    engine.set_scene(scene)?;

    let title = engine.textbox().and_then(|t| t.title()).expect("title set");
    assert_eq!(title.style.color, Some(Color::rgb(0x00, 0x56, 0xa2)));

    engine.progress_dialog()?;
    engine.progress_dialog()?;
    let title = engine.textbox().and_then(|t| t.title()).expect("title set");
    assert_eq!(title.text, "Red");
    assert_eq!(title.style.color, Some(Color::rgb(0xff, 0, 0)));
    Ok(())
}

#[test_log::test]
fn dialog_factory_sees_the_textbox() -> Result<()> {
    let mut engine = engine_with(MemoryLoader::new());
    engine.set_scene(Scene::new("empty"))?;
    let (scene, ctx) = engine.scene_and_context().expect("scene installed");
    scene.set_dialog_factory(ctx, |_, ctx| {
        let open = ctx.textbox().is_some();
        vec![Script::new().display(if open { "ready" } else { "missing" }).into()]
    })?;
    assert_eq!(engine.progress_dialog()?, Progress::Advanced(0));
    let textbox = engine.textbox().expect("textbox attached");
    let text: String = textbox.fragments().iter().map(|f| f.text.as_str()).collect();
    assert_eq!(text, "ready");
    Ok(())
}

#[test_log::test]
fn dialog_without_textbox_is_rejected() {
    let mut engine = Engine::new(StageConfig::default(), Box::new(MemoryLoader::new()));
    let mut scene = Scene::new("bare");
    scene.set_dialog_list(vec![Script::new().into()]);
    assert!(matches!(engine.set_scene(scene), Err(StageError::NoTextbox)));
}
