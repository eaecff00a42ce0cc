//! render-dispatch - render once in the background, fall back to inline rendering if needed.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use render_dispatch::coordinator::{CoordinatorEvent, DispatchEnv, RenderCoordinator};
use render_dispatch::config::SceneKind;
use render_dispatch::{output, DispatchConfig};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity
    env_logger::init();

    let matches = Command::new("render-dispatch")
        .version(render_dispatch::VERSION)
        .about("Render an image on a background worker, falling back to inline rendering")
        .long_about(
            "render-dispatch runs the built-in ray tracer on a background worker thread and \
             reports elapsed time while it works. When the host cannot run the worker, the \
             render happens on the calling thread instead.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("inline")
                .long("inline")
                .action(ArgAction::SetTrue)
                .help("Use a host without background worker support"),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PIXELS")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PIXELS")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("samples")
                .short('s')
                .long("samples")
                .value_name("N")
                .value_parser(value_parser!(u32))
                .help("Samples per pixel"),
        )
        .arg(
            Arg::new("scene")
                .long("scene")
                .value_name("NAME")
                .value_parser(SceneKind::NAMES)
                .help("Built-in scene to render"),
        )
        .arg(
            Arg::new("aperture")
                .long("aperture")
                .value_name("DIAMETER")
                .value_parser(value_parser!(f64))
                .help("Camera lens diameter (0 for a pinhole)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .default_value("render.png")
                .help("Where to write the PNG"),
        )
        .get_matches();

    let mut config = load_config(matches.get_one::<PathBuf>("config"))?;
    if matches.get_flag("inline") {
        config.force_inline = true;
    }
    if let Some(width) = matches.get_one::<u32>("width") {
        config.tracer.width = *width;
    }
    if let Some(height) = matches.get_one::<u32>("height") {
        config.tracer.height = *height;
    }
    if let Some(samples) = matches.get_one::<u32>("samples") {
        config.tracer.samples_per_pixel = *samples;
    }
    if let Some(scene) = matches.get_one::<String>("scene") {
        config.tracer.scene = SceneKind::from_name(scene)
            .with_context(|| format!("unknown scene '{}'", scene))?;
    }
    if let Some(aperture) = matches.get_one::<f64>("aperture") {
        config.tracer.aperture = *aperture;
    }
    config.validate()?;

    let output_path = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("render.png"));

    let env = DispatchEnv::from_config(&config);
    let (handle, mut events, task) = RenderCoordinator::spawn(env, &config);

    let mut started = false;
    let result = loop {
        match events.recv().await {
            Some(CoordinatorEvent::Ready) if !started => {
                started = handle.start();
                if !started {
                    bail!("render control was not available");
                }
            }
            Some(CoordinatorEvent::Ready) => {}
            Some(CoordinatorEvent::Progress(label)) => eprint!("\r{:<72}", label),
            Some(CoordinatorEvent::Degraded(notice)) => eprintln!("\n{}", notice),
            Some(CoordinatorEvent::Warning(message)) => log::warn!("{}", message),
            Some(CoordinatorEvent::Result(result)) => break result,
            Some(CoordinatorEvent::Error(message)) => {
                handle.shutdown();
                bail!("render failed: {}", message);
            }
            None => bail!("coordinator exited before producing a result"),
        }
    };
    eprintln!();

    handle.shutdown();
    task.await.context("coordinator task failed")?;

    output::write_png(&result, &output_path)
        .with_context(|| format!("writing {}", output_path.display()))?;

    println!(
        "{}x{} px, {} spp, {} rays in {:.1}ms -> {}",
        result.width(),
        result.height(),
        result.samples_per_pixel(),
        result.total_rays(),
        result.duration_ms(),
        output_path.display()
    );
    Ok(())
}

#[cfg(feature = "config")]
fn load_config(path: Option<&PathBuf>) -> Result<DispatchConfig> {
    Ok(DispatchConfig::load(path.map(PathBuf::as_path))?)
}

#[cfg(not(feature = "config"))]
fn load_config(path: Option<&PathBuf>) -> Result<DispatchConfig> {
    if path.is_some() {
        bail!("configuration files need the `config` feature");
    }
    Ok(DispatchConfig::default())
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_version_constant() {
        assert!(!render_dispatch::VERSION.is_empty());
    }
}
