//! Viewport stack, view box fitting and the per-document screen.

use std::cell::RefCell;

use svgpaint_canvas::RenderingContext2D;
use tracing::trace;

use crate::barrier::LoadBarrier;
use crate::util::compress_spaces;

/// Viewport size used when nothing has been pushed.
pub const DEFAULT_VIEWPORT: (f64, f64) = (800.0, 600.0);

/// Axis a length is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    /// Normalized diagonal, `sqrt((w^2 + h^2) / 2)`.
    Diagonal,
}

/// Stack of nested viewport sizes.
#[derive(Debug, Default)]
pub struct ViewPort {
    sizes: RefCell<Vec<(f64, f64)>>,
}

impl ViewPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.sizes.borrow_mut().clear();
    }

    /// Push a viewport for the lifetime of the returned guard.
    pub fn push(&self, width: f64, height: f64) -> ViewportGuard<'_> {
        self.set_current(width, height);
        ViewportGuard { viewport: self }
    }

    pub fn set_current(&self, width: f64, height: f64) {
        self.sizes.borrow_mut().push((width, height));
    }

    pub fn remove_current(&self) {
        self.sizes.borrow_mut().pop();
    }

    /// Replace the innermost viewport without changing the depth.
    pub fn replace_current(&self, width: f64, height: f64) {
        let mut sizes = self.sizes.borrow_mut();
        sizes.pop();
        sizes.push((width, height));
    }

    pub fn current(&self) -> (f64, f64) {
        self.sizes.borrow().last().copied().unwrap_or(DEFAULT_VIEWPORT)
    }

    pub fn depth(&self) -> usize {
        self.sizes.borrow().len()
    }

    pub fn width(&self) -> f64 {
        self.current().0
    }

    pub fn height(&self) -> f64 {
        self.current().1
    }

    pub fn compute_size(&self, axis: Axis) -> f64 {
        let (width, height) = self.current();
        match axis {
            Axis::X => width,
            Axis::Y => height,
            Axis::Diagonal => ((width * width + height * height) / 2.0).sqrt(),
        }
    }
}

/// Pops its viewport when dropped.
#[must_use = "the viewport is popped when the guard is dropped"]
pub struct ViewportGuard<'a> {
    viewport: &'a ViewPort,
}

impl Drop for ViewportGuard<'_> {
    fn drop(&mut self) {
        self.viewport.remove_current();
    }
}

/// Inputs for fitting a view box into a viewport.
#[derive(Debug, Clone, Default)]
pub struct ViewBox<'a> {
    /// `preserveAspectRatio` value.
    pub aspect_ratio: &'a str,
    pub width: f64,
    pub desired_width: f64,
    pub height: f64,
    pub desired_height: f64,
    pub min_x: f64,
    pub min_y: f64,
    /// Resolved `refX`/`refY`, present only when both are set.
    pub reference: Option<(f64, f64)>,
    pub clip: bool,
    pub clip_x: f64,
    pub clip_y: f64,
}

/// Owns the viewport stack and the load barrier of a document.
#[derive(Debug, Default)]
pub struct Screen {
    pub viewport: ViewPort,
    barrier: LoadBarrier,
}

impl Screen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn barrier(&self) -> &LoadBarrier {
        &self.barrier
    }

    /// True once every registered load condition holds.
    pub fn is_ready(&self) -> bool {
        self.barrier.is_ready()
    }

    pub async fn ready(&self) {
        self.barrier.finish_loading().await;
    }

    /// Map a view box onto the viewport per `preserveAspectRatio`.
    pub fn set_view_box(&self, ctx: &mut dyn RenderingContext2D, view_box: &ViewBox<'_>) {
        let clean = compress_spaces(view_box.aspect_ratio);
        let clean = clean.strip_prefix("defer ").unwrap_or(&clean);
        let mut parts = clean.split(' ');
        let align = parts.next().filter(|s| !s.is_empty()).unwrap_or("xMidYMid");
        let meet_or_slice = parts.next().unwrap_or("meet");

        let ViewBox {
            width,
            desired_width,
            height,
            desired_height,
            ..
        } = *view_box;

        let scale_x = width / desired_width;
        let scale_y = height / desired_height;
        let scale_min = scale_x.min(scale_y);
        let scale_max = scale_x.max(scale_y);

        let (mut final_width, mut final_height) = (desired_width, desired_height);
        match meet_or_slice {
            "meet" => {
                final_width *= scale_min;
                final_height *= scale_min;
            }
            "slice" => {
                final_width *= scale_max;
                final_height *= scale_max;
            }
            _ => {}
        }

        if let Some((ref_x, ref_y)) = view_box.reference {
            ctx.translate(-scale_min * ref_x, -scale_min * ref_y);
        }

        if view_box.clip {
            let clip_x = scale_min * view_box.clip_x;
            let clip_y = scale_min * view_box.clip_y;
            ctx.begin_path();
            ctx.move_to(clip_x, clip_y);
            ctx.line_to(width, clip_y);
            ctx.line_to(width, height);
            ctx.line_to(clip_x, height);
            ctx.close_path();
            ctx.clip();
        }

        if view_box.reference.is_none() {
            let meet = meet_or_slice == "meet";
            let slice = meet_or_slice == "slice";
            let fits_y = (meet && scale_min == scale_y) || (slice && scale_max == scale_y);
            let fits_x = (meet && scale_min == scale_x) || (slice && scale_max == scale_x);

            if align.starts_with("xMid") && fits_y {
                ctx.translate(width / 2.0 - final_width / 2.0, 0.0);
            }
            if align.ends_with("YMid") && fits_x {
                ctx.translate(0.0, height / 2.0 - final_height / 2.0);
            }
            if align.starts_with("xMax") && fits_y {
                ctx.translate(width - final_width, 0.0);
            }
            if align.ends_with("YMax") && fits_x {
                ctx.translate(0.0, height - final_height);
            }
        }

        if align == "none" {
            ctx.scale(scale_x, scale_y);
        } else if meet_or_slice == "meet" {
            ctx.scale(scale_min, scale_min);
        } else if meet_or_slice == "slice" {
            ctx.scale(scale_max, scale_max);
        }

        ctx.translate(-view_box.min_x, -view_box.min_y);
        trace!(align, meet_or_slice, scale_x, scale_y, "View box applied");
    }
}
