use log::info;
use mapviz::{draw_legend, EdgeStyle, Font, RenderConfig, RgbaImage, Scene};

use crate::error::StatusOr;
use crate::model::StreetGraph;
use crate::style::{classify_road_segments, ResolvedStyle};

/// Classify every edge of `graph` and draw it, with the legend on top when
/// the style asks for one.
pub fn render_street_map(graph: &StreetGraph, style: &ResolvedStyle, font: Option<&Font<'_>>) -> StatusOr<RgbaImage> {
    let (colors, widths) = classify_road_segments(graph.edge_attributes(), &style.table);
    let edge_styles = colors.into_iter()
        .zip(widths)
        .map(|(color, width)| EdgeStyle { color, width })
        .collect();

    let scene = Scene::new(graph.edge_paths(), edge_styles)?;
    let config = RenderConfig { background: style.background, ..RenderConfig::default() };
    let mut image = mapviz::render_scene(&scene, &config)?;

    if style.legend {
        draw_legend(&mut image, &style.table.legend_entries(), font, config.px_per_point());
    }

    info!("Rendered {} edges into a {}x{} image", graph.edges.len(), image.width(), image.height());
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleOptions;
    use crate::testing::small_graph;

    #[test]
    fn transparent_maps_keep_an_empty_alpha_channel() {
        let style = StyleOptions { transparent: true, legend: false, ..StyleOptions::default() }
            .resolve()
            .unwrap();
        let image = render_street_map(&small_graph(), &style, None).unwrap();

        assert_eq!(image.width().max(image.height()), 2400);
        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert!(image.pixels().any(|p| p[3] == 255));
    }

    #[test]
    fn legend_is_drawn_over_the_lower_left_corner() {
        let without = StyleOptions { legend: false, ..StyleOptions::default() }.resolve().unwrap();
        let with = StyleOptions::default().resolve().unwrap();

        let plain = render_street_map(&small_graph(), &without, None).unwrap();
        let legend = render_street_map(&small_graph(), &with, None).unwrap();

        // The panel inset is half an entry: 16pt at 300 dpi is about 67 px
        let probe = (40, plain.height() - 40);
        assert_ne!(plain.get_pixel(probe.0, probe.1), legend.get_pixel(probe.0, probe.1));
        assert_eq!(plain.get_pixel(plain.width() - 1, 0), legend.get_pixel(legend.width() - 1, 0));
    }

    #[test]
    fn empty_graph_cannot_be_rendered() {
        let style = StyleOptions::default().resolve().unwrap();
        assert!(render_street_map(&StreetGraph::new(), &style, None).is_err());
    }
}
