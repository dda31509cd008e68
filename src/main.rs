use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use xrphone_native::engine::cli::{CLI, CliCommand};
use xrphone_native::engine::config::BackendKind;
use xrphone_native::engine::config::InfraConfig;
use xrphone_native::engine::networking::{InfraMessage, PoseStreamer, connect_sink, request_dom_shift};
use xrphone_native::engine::{EngineError, EngineResult, PlatformContext, XrConfig, XrSession, runtime};
use xrphone_native::utils;

fn main() {
    utils::logger::init();

    let cli = CLI::parse();
    let mut config = XrConfig::from_env();
    if cli.mock {
        config.backend = BackendKind::Mock;
    }
    if runtime::install(XrSession::new(config)).is_err() {
        eprintln!("runtime already installed");
    }

    let result = match cli.command {
        CliCommand::Run { frames } => run(frames),
        CliCommand::Stream { endpoint, seconds } => stream(endpoint, seconds),
        CliCommand::DomShift {
            scene,
            reason,
            endpoint,
        } => dom_shift(endpoint, &scene, &reason),
    };

    if let Err(e) = runtime::shutdown() {
        eprintln!("shutdown failed: {}", e);
    }
    if let Err(e) = result {
        eprintln!("xrphone: {}", e);
        std::process::exit(1);
    }
}

/// Walks the full lifecycle the way the Android host does.
fn run(frames: u32) -> EngineResult<()> {
    runtime::initialize(&PlatformContext::Desktop)?;
    runtime::resume()?;

    for _ in 0..frames {
        let p = runtime::head_pose();
        println!(
            "t={} pos=({:.3}, {:.3}, {:.3}) rot=({:.3}, {:.3}, {:.3}, {:.3})",
            p.timestamp_ns,
            p.position[0],
            p.position[1],
            p.position[2],
            p.orientation[0],
            p.orientation[1],
            p.orientation[2],
            p.orientation[3]
        );
        thread::sleep(Duration::from_millis(11));
    }

    runtime::pause()?;
    println!("state: {:?}", runtime::state());
    runtime::resume()?;
    println!("state: {:?}", runtime::state());
    Ok(())
}

fn stream(endpoint: Option<String>, seconds: u32) -> EngineResult<()> {
    let infra = runtime::config().infra;
    let endpoint = resolve_endpoint(endpoint, &infra)?;

    runtime::initialize(&PlatformContext::Desktop)?;
    runtime::resume()?;

    let mut streamer = PoseStreamer::spawn(
        Arc::new(runtime::head_pose),
        connect_sink(&endpoint, Box::new(print_inbound))?,
        infra.device_id,
        infra.capabilities,
        infra.pose_rate_hz,
    )?;

    let until = Instant::now() + Duration::from_secs(seconds as u64);
    while Instant::now() < until {
        thread::sleep(Duration::from_millis(100));
    }

    let sent = streamer.stop();
    println!("sent {} poses", sent);
    Ok(())
}

/// Sends `hello` and one scene-shift request, no XR session needed.
fn dom_shift(endpoint: Option<String>, scene: &str, reason: &str) -> EngineResult<()> {
    let infra = runtime::config().infra;
    let endpoint = resolve_endpoint(endpoint, &infra)?;

    let mut sink = connect_sink(&endpoint, Box::new(print_inbound))?;
    sink.send(&InfraMessage::hello(&infra.device_id, &infra.capabilities))?;
    request_dom_shift(sink.as_mut(), &infra.device_id, scene, reason)?;
    println!("requested scene {} ({})", scene, reason);
    Ok(())
}

fn resolve_endpoint(endpoint: Option<String>, infra: &InfraConfig) -> EngineResult<String> {
    endpoint
        .or_else(|| infra.endpoint.clone())
        .ok_or_else(|| EngineError::Config("no InfraNet endpoint given or configured".to_string()))
}

fn print_inbound(message: InfraMessage) {
    match message {
        InfraMessage::DomShiftRequest {
            target_scene, reason, ..
        } => println!("host asks for scene {} ({})", target_scene, reason),
        other => println!("host sent {:?}", other),
    }
}
