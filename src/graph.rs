use plotters::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::ops::Range;
use thiserror::Error;
use uuid::Uuid;

/// Points drawn on the visualization page until charts are fed from the uploaded data
pub const PLACEHOLDER_POINTS: [(f64, f64); 2] = [(1.0, 3.0), (2.0, 4.0)];

/// Errors raised while building a chart
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no points to plot")]
    Empty,

    #[error("failed to draw chart: {0}")]
    Draw(String),

    #[error("failed to encode chart data: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title carried in the chart's data block
    pub title: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,

    /// Marker radius in pixels
    pub point_size: i32,
}

impl Default for GraphOptions {
    /// 600x400 canvas with 6 pixel markers
    fn default() -> Self {
        Self {
            title: "Graph".to_string(),
            width: 600,
            height: 400,
            point_size: 6,
        }
    }
}

/// Embeddable chart: a data script block plus the markup that displays it
///
/// Both fields are raw HTML and must be inserted into templates unescaped.
#[derive(Debug, Clone, Serialize)]
pub struct ChartComponents {
    pub script: String,
    pub div: String,
}

/// Creates a scatter chart from data points
///
/// The chart is drawn as inline SVG. No text is drawn on the canvas, so no
/// font backend is needed; the title travels in the script block instead.
///
/// # Arguments
/// * `points` - (x, y) pairs to plot
/// * `options` - Chart size and title
///
/// # Returns
/// * `Result<ChartComponents, ChartError>` - Script and markup fragments, or an error
///
/// # Errors
/// * Returns an error if `points` is empty or drawing fails
pub fn build_scatter(
    points: &[(f64, f64)],
    options: &GraphOptions,
) -> Result<ChartComponents, ChartError> {
    if points.is_empty() {
        return Err(ChartError::Empty);
    }

    let svg = render_scatter_svg(points, options)?;
    let id = format!("chart-{}", Uuid::new_v4().simple());
    let payload = serde_json::to_string(&json!({
        "target": id,
        "title": options.title,
        "points": points,
    }))?;

    Ok(ChartComponents {
        script: format!(
            "<script type=\"application/json\" id=\"{id}-data\">{}</script>",
            payload.replace("</", "<\\/")
        ),
        div: format!("<div class=\"chart\" id=\"{id}\">{svg}</div>"),
    })
}

fn render_scatter_svg(points: &[(f64, f64)], options: &GraphOptions) -> Result<String, ChartError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;

        let (x_range, y_range) = padded_ranges(points);
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(x_range, y_range)
            .map_err(draw_error)?;

        chart
            .plotting_area()
            .fill(&RGBColor(245, 245, 245))
            .map_err(draw_error)?;

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), options.point_size, BLUE.filled())),
            )
            .map_err(draw_error)?;

        root.present().map_err(draw_error)?;
    }
    Ok(svg)
}

/// Axis ranges covering every point with one unit of padding on each side
fn padded_ranges(points: &[(f64, f64)]) -> (Range<f64>, Range<f64>) {
    let bounds = |values: &mut dyn Iterator<Item = f64>| {
        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        (min - 1.0)..(max + 1.0)
    };
    (
        bounds(&mut points.iter().map(|&(x, _)| x)),
        bounds(&mut points.iter().map(|&(_, y)| y)),
    )
}

fn draw_error(err: impl std::fmt::Display) -> ChartError {
    ChartError::Draw(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scatter_embeds_one_marker_per_point() {
        let chart = build_scatter(&PLACEHOLDER_POINTS, &GraphOptions::default()).unwrap();
        assert!(chart.div.starts_with("<div class=\"chart\""));
        assert!(chart.div.contains("<svg"));
        assert_eq!(chart.div.matches("<circle").count(), PLACEHOLDER_POINTS.len());
        assert!(chart.script.contains("[[1.0,3.0],[2.0,4.0]]"));
    }

    #[test]
    fn script_and_div_share_an_id() {
        let chart = build_scatter(&[(0.0, 0.0)], &GraphOptions::default()).unwrap();
        let id_start = chart.div.find("id=\"").unwrap() + 4;
        let id_end = id_start + chart.div[id_start..].find('"').unwrap();
        let id = &chart.div[id_start..id_end];
        assert!(chart.script.contains(&format!("id=\"{id}-data\"")));
    }

    #[test]
    fn title_cannot_close_the_script_block() {
        let options = GraphOptions {
            title: "</script><b>".to_string(),
            ..GraphOptions::default()
        };
        let chart = build_scatter(&PLACEHOLDER_POINTS, &options).unwrap();
        assert_eq!(chart.script.matches("</script>").count(), 1);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            build_scatter(&[], &GraphOptions::default()),
            Err(ChartError::Empty)
        ));
    }

    #[test]
    fn ranges_pad_single_points() {
        let (x, y) = padded_ranges(&[(2.0, 5.0)]);
        assert_eq!(x, 1.0..3.0);
        assert_eq!(y, 4.0..6.0);
    }
}
