use std::sync::Arc;
use std::time::Duration;

use marionette::{
    BehaviorTable, ChannelCounts, ClipPayload, ClipRegistry, ClipSource, Director, DirectorConfig,
    FrameIndex, NullSink, PerformanceState,
};

struct DemoSource;

impl ClipSource for DemoSource {
    fn resolve(&self, _id: &str, _source: &str) -> anyhow::Result<ClipPayload> {
        Ok(ClipPayload {
            duration_frames: 90,
            channels: ChannelCounts { bone: 40, morph: 8 },
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let registry = ClipRegistry::from_json(include_str!("../tests/data/catalog.json"))?;
    let mut director = Director::new(
        registry,
        BehaviorTable::standard(),
        Arc::new(DemoSource),
        Box::new(NullSink),
        DirectorConfig::default(),
    )?;

    for frame in 1..=360u64 {
        if frame == 200 {
            director.transition_to_state(PerformanceState::Celebrating)?;
        }
        for event in director.tick(FrameIndex(frame)) {
            println!("frame {frame}: {event:?}");
        }
        std::thread::sleep(Duration::from_millis(4));
    }
    director.dispose();

    Ok(())
}
