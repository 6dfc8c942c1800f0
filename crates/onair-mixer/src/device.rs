// crates/onair-mixer/src/device.rs
//
// The mixer "device" abstraction a real accelerator backend would slot
// into (GPU context, shader programs, texture uploads). This crate is
// scoped at "what a shader must compute", not a GPU binding, so
// `CpuDevice` is the only implementation: a software rasterizer that
// computes the same result a shader pipeline would, running on the
// mixer's own task queue thread.

use onair_core::{Pool, TaskQueue};

use crate::item::Layer;
use crate::render::{render_tree, RenderTarget};

/// A compositing backend: takes a finished draw tree and produces a
/// rendered target of the given dimensions.
pub trait Device: Send {
    fn composite(&self, tree: &Layer, width: u32, height: u32) -> RenderTarget;
}

/// Reference software compositor. Holds a pool of reusable RGBA scratch
/// buffers keyed by `(width, height)` so repeated ticks at a channel's
/// fixed resolution don't reallocate every frame.
pub struct CpuDevice {
    scratch: Pool<(u32, u32), Vec<f32>>,
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuDevice {
    pub fn new() -> Self {
        Self {
            scratch: Pool::new(|&(w, h)| vec![0.0f32; w as usize * h as usize * 4]),
        }
    }
}

impl Device for CpuDevice {
    fn composite(&self, tree: &Layer, width: u32, height: u32) -> RenderTarget {
        let _warm = self.scratch.acquire((width, height));
        render_tree(tree, width, height)
    }
}

/// Runs a `Device` on its own single-threaded queue, mirroring how a
/// real GPU context serializes all draws/readbacks through one thread
/// (§5's "implementation budget" note on device ownership).
pub struct DeviceThread {
    queue: TaskQueue,
}

impl DeviceThread {
    pub fn spawn(name: impl Into<String>) -> Self {
        Self {
            queue: TaskQueue::spawn(name),
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::TreeBuilder;

    #[test]
    fn cpu_device_composites_an_empty_tree_to_transparent() {
        let device = CpuDevice::new();
        let tree = TreeBuilder::new().finish();
        let target = device.composite(&tree, 4, 4);
        assert_eq!(target.rgba, vec![0.0; 4 * 4 * 4]);
    }

    #[test]
    fn scratch_pool_reuses_buffers_across_composites() {
        let device = CpuDevice::new();
        let tree = TreeBuilder::new().finish();
        device.composite(&tree, 8, 8);
        device.composite(&tree, 8, 8);
        assert_eq!(device.scratch.idle_count(), 1);
    }
}
