// crates/onair-engine/src/registry.rs
//
// Producer/consumer factory registries (C11, §6): `register_producer` /
// `register_consumer` take a factory closure keyed by a parameter-vector
// parser; the first one in registration order that recognizes a param
// vector builds the instance. Mirrors the channel index a factory is
// asked to build for, so producers/consumers can size themselves to
// that channel's live format if they need to.

use crate::consumer::ConsumerHandle;
use crate::producer::ProducerHandle;

pub type ProducerFactory = Box<dyn Fn(u32, &[String]) -> Option<ProducerHandle> + Send + Sync>;
pub type ConsumerFactory = Box<dyn Fn(u32, &[String]) -> Option<ConsumerHandle> + Send + Sync>;

/// Ordered list of producer factories; `build` returns the first match.
#[derive(Default)]
pub struct ProducerRegistry {
    factories: Vec<ProducerFactory>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: ProducerFactory) {
        self.factories.push(factory);
    }

    pub fn build(&self, channel_index: u32, params: &[String]) -> Option<ProducerHandle> {
        self.factories.iter().find_map(|f| f(channel_index, params))
    }
}

#[derive(Default)]
pub struct ConsumerRegistry {
    factories: Vec<ConsumerFactory>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: ConsumerFactory) {
        self.factories.push(factory);
    }

    pub fn build(&self, channel_index: u32, params: &[String]) -> Option<ConsumerHandle> {
        self.factories.iter().find_map(|f| f(channel_index, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::InMemorySinkConsumer;
    use crate::producer::ColorProducer;

    #[test]
    fn first_matching_factory_wins() {
        let mut registry = ProducerRegistry::new();
        registry.register(Box::new(|_channel, params| {
            if params.first().map(String::as_str) == Some("color") {
                let rgba = ColorProducer::parse_hex(params.get(1)?).ok()?;
                Some(ColorProducer::handle(4, 4, 2, rgba))
            } else {
                None
            }
        }));
        registry.register(Box::new(|_channel, params| {
            (params.first().map(String::as_str) == Some("empty")).then(crate::producer::EmptyProducer::handle)
        }));

        assert!(registry.build(0, &["color".into(), "#ff0000".into()]).is_some());
        assert!(registry.build(0, &["empty".into()]).is_some());
        assert!(registry.build(0, &["unknown".into()]).is_none());
    }

    #[test]
    fn unmatched_params_fall_through_every_factory() {
        let mut registry = ConsumerRegistry::new();
        registry.register(Box::new(|_channel, params| -> Option<ConsumerHandle> {
            if params.first().map(String::as_str) == Some("sink") {
                Some(InMemorySinkConsumer::new("sink").handle())
            } else {
                None
            }
        }));
        assert!(registry.build(0, &["other".into()]).is_none());
        assert!(registry.build(0, &["sink".into()]).is_some());
    }
}
