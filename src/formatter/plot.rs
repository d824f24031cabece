//! Debug overlay: the gaps between columns and the layout totals.

use super::Formatter;
use crate::svg_builder::SvgBuilder;

const GAP_FILL: &str = "rgba(100,200,100,0.4)";
const LABEL_SIZE: f64 = 8.0;

impl Formatter {
    /// Shade every gap between columns from `y1` to `y2` and label it with
    /// its width, then print loss, shift and total gap underneath. `x_pos`
    /// is the stave's x; the stave padding is added here.
    pub fn plot_debugging(&self, svg: &mut SvgBuilder, x_pos: f64, y1: f64, y2: f64) {
        let x = x_pos + self.spacing.stave_padding;
        for gap in &self.context_gaps.gaps {
            svg.rect(x + gap.x1, y1, gap.width().max(0.0), y2 - y1, GAP_FILL, "none", 0.0);
            svg.text(
                x + gap.x1,
                y2 + 12.0,
                &gap.width().round().to_string(),
                LABEL_SIZE,
                "green",
                "start",
            );
        }
        let summary = format!(
            "Loss: {:.2} Shift: {:.2} Gap: {:.2}",
            self.total_cost, self.total_shift, self.context_gaps.total
        );
        svg.text(x - 20.0, y2 + 27.0, &summary, LABEL_SIZE, "red", "start");
    }
}
