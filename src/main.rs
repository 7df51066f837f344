use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, bail};
use log::info;

use vn_stage::{
    config::StageConfig,
    engine::{
        Engine,
        animation::{ShakingAnimation, SighAnimation, UpDownAnimation},
        dialog::{DialogStep, Script},
        loader::FsImageLoader,
        nodes::{MoveTo, Node, NodeOptions, Origin, TextContent, continue_dialog, say},
        scene::{Scene, SceneEvent},
        textbox::{TextInput, TextStyle, TextTemplate, Textbox},
    },
    player::Player,
    types::{Color, TextAlign, percent},
};

fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

const USAGE: &str = "vn-stage [--config <stage.json>] [--assets <dir>] [--debug]";

fn run() -> Result<()> {
    let mut config_path: Option<PathBuf> = None;
    let mut assets = PathBuf::from("assets");
    let mut debug = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = Some(args.next().context(USAGE)?.into()),
            "--assets" => assets = args.next().context(USAGE)?.into(),
            "--debug" => debug = true,
            "-h" | "--help" => bail!("vn-stage: terminal visual-novel stage\n\nUsage:\n  {USAGE}"),
            other => bail!("Unknown argument {other:?}\n\nUsage:\n  {USAGE}"),
        }
    }

    let mut config = match &config_path {
        Some(path) => StageConfig::load_from(path),
        None => StageConfig::load(),
    };
    config.debug |= debug;
    info!("stage {}x{}, assets in {}", config.width, config.height, assets.display());

    let mut engine = Engine::new(config, Box::new(FsImageLoader::new(assets)));
    engine.set_textbox(Textbox::new());
    engine.set_scene(prologue()?).context("Failed to start the prologue")?;

    let mut player = Player::new(engine);
    player.play()
}

fn prologue() -> Result<Scene> {
    let mut scene = Scene::new("prologue");

    scene.add(Node::boxed(NodeOptions {
        layer: -1,
        width: 800.0,
        height: 600.0,
        color: Some(Color::from(0x1d2b53)),
        ..NodeOptions::tagged("backdrop")
    }));

    let ion = scene.add(Node::character(
        NodeOptions {
            x: 400.0,
            y: 560.0,
            origin: Origin::new(percent(50.0), percent(100.0)),
            layer: 1,
            width: 160.0,
            height: 320.0,
            color: Some(Color::from(0x0056a2)),
            ..NodeOptions::tagged("ionchan")
        },
        "Ionchan",
        Some("ionchan.png"),
        Some(100.0),
    ));

    let badge = scene.spawn(Node::text(
        NodeOptions {
            y: -340.0,
            color: Some(Color::WHITE),
            ..NodeOptions::tagged("badge")
        },
        TextContent::new("<3").with_align(TextAlign::Center),
    ));
    scene.add_child(ion, badge)?;
    scene.get_mut(badge)?.set_animation(UpDownAnimation::new()).start_animation(0.0);

    scene.add_on_click(ion, |scene, ctx, id| {
        let node = scene.get_mut(id)?;
        if node.animation_running() {
            node.stop_animation();
        } else {
            node.set_animation(ShakingAnimation::default()).start_animation(ctx.now());
        }
        Ok(())
    })?;

    let ionchan = TextStyle {
        color: Some(Color::from(0x0056a2)),
        bold: Some(true),
        ..TextStyle::default()
    };
    scene.set_dialog_list(vec![
        Script::new().display_titled("A quiet evening on the stage.", "Narrator").into(),
        say(ion, "Hi there! I'm Ionchan."),
        continue_dialog(" Nice to meet you."),
        Script::new()
            .move_to(ion, MoveTo::x(220.0))
            .say(ion, "Let me make some room.")
            .into(),
        Script::new()
            .set_animation(ion, SighAnimation::default())
            .start_animation(ion)
            .say(ion, "Phew... that was a long walk.")
            .into(),
        Script::new()
            .stop_animation(ion)
            .pause_progression()
            .display("(Ionchan is heading back.)")
            .wait(800.0)
            .move_to(ion, MoveTo::x(400.0).delay_steps(12))
            .resume_progression()
            .into(),
        DialogStep::new(move |_| {
            let name = TextTemplate {
                text: "Ionchan".into(),
                style: ionchan.clone(),
            };
            Script::new()
                .wait_for_reveal()
                .display(vec![TextInput::from("Thanks for spending time with "), name.into(), "!".into()])
                .wait(2000.0)
                .unless_proceeded()
                .say(ion, "Click again when you're ready to go.")
        }),
    ]);

    scene.on(SceneEvent::Finished, |_, ctx| {
        ctx.request_scene(credits());
        Ok(())
    });

    Ok(scene)
}

fn credits() -> Scene {
    let mut scene = Scene::new("credits");
    scene.add(Node::text(
        NodeOptions {
            x: 400.0,
            y: 200.0,
            origin: Origin::new(percent(50.0), 0.0),
            color: Some(Color::WHITE),
            ..NodeOptions::tagged("title")
        },
        TextContent::new("Thanks for watching").with_font_size(32.0),
    ));
    scene.set_dialog_list(vec![Script::new().display("The end. Press q to quit.").into()]);
    scene
}
