// crates/onair-engine/src/main.rs
//
// Demo binary: brings up a `PlayoutServer` from an `EngineConfig`, loads
// a color producer onto channel 1's background layer and cuts it to
// air, attaches an in-memory sink consumer so the tick loop has
// somewhere to publish frames, and logs the monitor snapshot once a
// second until interrupted.

use std::time::Duration;

use log::info;
use onair_core::{EngineConfig, PixelFormat};
use onair_engine::{ColorProducer, InMemorySinkConsumer, PlayoutServer};

fn main() {
    env_logger::init();

    let config = EngineConfig::single_channel("PAL");
    let server = PlayoutServer::new(PixelFormat::Bgra);

    for channel_config in &config.channels {
        server
            .create_channel(channel_config.index, &channel_config.format_id)
            .expect("channel configuration names a known format and a fresh index");
        info!("channel {} up on format '{}'", channel_config.index, channel_config.format_id);
    }

    let channel_index = config.channels[0].index;
    let rgba = ColorProducer::parse_hex("#2060a0").expect("valid built-in demo color");
    let producer = ColorProducer::handle(1280, 720, 2, rgba);
    server.load(channel_index, 0, producer, false, false).expect("channel exists").wait();
    server.play(channel_index, 0, None, None).expect("channel exists").wait().expect("empty-producer play never fails");

    let sink = InMemorySinkConsumer::new("demo-monitor").with_buffer_depth(1).handle();
    server.add_consumer(channel_index, vec!["demo".into()], sink, None).expect("channel exists");

    info!("onair demo running; Ctrl-C to stop");
    loop {
        std::thread::sleep(Duration::from_secs(1));
        info!("monitor: {:?}", server.monitor_snapshot());
    }
}
