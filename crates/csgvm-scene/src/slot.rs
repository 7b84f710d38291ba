//! Generation swap for scene edits.
//!
//! Readers take a snapshot at the start of a query batch and keep it for the
//! whole batch; an edit publishes a new scene without touching the old one,
//! which stays alive until its last snapshot is dropped.

use crate::scene::Scene;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A scene generation handed out by [`SceneSlot::snapshot`].
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Generation number, starting at 0 and increasing by one per publish.
    pub generation: u64,
    /// The scene of that generation.
    pub scene: Arc<Scene>,
}

/// Shared holder of the current scene generation.
#[derive(Debug)]
pub struct SceneSlot {
    current: RwLock<Snapshot>,
    generation: AtomicU64,
}

impl SceneSlot {
    /// Slot holding `scene` as generation 0.
    pub fn new(scene: Scene) -> Self {
        Self {
            current: RwLock::new(Snapshot {
                generation: 0,
                scene: Arc::new(scene),
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// The current generation. Queries run on the returned scene without
    /// holding any lock.
    pub fn snapshot(&self) -> Snapshot {
        self.current.read().clone()
    }

    /// Latest published generation number.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replace the scene. Outstanding snapshots keep the previous one.
    /// Returns the new generation number.
    pub fn publish(&self, scene: Scene) -> u64 {
        let scene = Arc::new(scene);
        let mut current = self.current.write();
        let generation = current.generation + 1;
        log::info!(
            "publishing scene generation {generation} ({} instances)",
            scene.len()
        );
        *current = Snapshot { generation, scene };
        self.generation.store(generation, Ordering::Release);
        generation
    }
}
