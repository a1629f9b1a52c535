//! Session view that renders every repaint onto a surface.

use crate::renderer::{RenderOutcome, Renderer, Surface};
use boardsync_core::operation::Operation;
use boardsync_core::session::Repaint;

/// Owns a renderer and its target surface.
pub struct BoardView<S: Surface> {
    renderer: Renderer,
    surface: S,
    last_outcome: RenderOutcome,
    frames: u64,
}

impl<S: Surface> BoardView<S> {
    pub fn new(surface: S) -> Self {
        Self::with_renderer(Renderer::new(), surface)
    }

    pub fn with_renderer(renderer: Renderer, surface: S) -> Self {
        Self {
            renderer,
            surface,
            last_outcome: RenderOutcome::default(),
            frames: 0,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Outcome of the latest repaint.
    pub fn last_outcome(&self) -> RenderOutcome {
        self.last_outcome
    }

    /// Number of repaints so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Collect finished image decodes. When this returns true the caller
    /// should ask the session for a repaint.
    pub fn poll_images(&mut self) -> bool {
        self.renderer.images_mut().poll()
    }
}

impl<S: Surface> Repaint for BoardView<S> {
    fn repaint(&mut self, operations: &[&Operation]) {
        self.last_outcome = self.renderer.render(&mut self.surface, operations.iter().copied());
        self.frames += 1;
        log::trace!(
            "Repainted {} operations ({} images pending)",
            self.last_outcome.replayed,
            self.last_outcome.pending_images
        );
    }
}
