//! Road style buckets, the length classifier and the named presets.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use clap::ValueEnum;
use mapviz::{Background, Color, LegendEntry};
use serde::{Deserialize, Serialize};

use crate::error::{MapError, StatusOr};
use crate::model::EdgeAttributes;

/// Slider range for line widths, in points.
pub const MIN_WIDTH: f32 = 0.1;
pub const MAX_WIDTH: f32 = 2.0;

/// Background used when neither a preset nor the user picks one.
pub const DEFAULT_BACKGROUND: Color = Color::rgb(0x31, 0xba, 0xb0);

/// Fixed, exhaustive set of style categories for a road segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bucket {
    #[serde(rename = "<100")]
    Under100,
    #[serde(rename = "100-200")]
    From100To200,
    #[serde(rename = "200-400")]
    From200To400,
    #[serde(rename = "400-800")]
    From400To800,
    #[serde(rename = ">800")]
    Over800,
    #[serde(rename = "primary")]
    Primary,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::Under100,
        Bucket::From100To200,
        Bucket::From200To400,
        Bucket::From400To800,
        Bucket::Over800,
        Bucket::Primary,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Bucket::Under100 => "<100",
            Bucket::From100To200 => "100-200",
            Bucket::From200To400 => "200-400",
            Bucket::From400To800 => "400-800",
            Bucket::Over800 => ">800",
            Bucket::Primary => "primary",
        }
    }

    /// Legend text for the bucket.
    pub fn label(self) -> &'static str {
        match self {
            Bucket::Under100 => "Length < 100 m",
            Bucket::From100To200 => "100-200 m",
            Bucket::From200To400 => "200-400 m",
            Bucket::From400To800 => "400-800 m",
            Bucket::Over800 => "> 800 m",
            Bucket::Primary => "Primary",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Length bucket with inclusive upper bounds: exactly 100 m is still `<100`.
    pub fn for_length(length: f64) -> Bucket {
        if length <= 100.0 {
            Bucket::Under100
        } else if length <= 200.0 {
            Bucket::From100To200
        } else if length <= 400.0 {
            Bucket::From200To400
        } else if length <= 800.0 {
            Bucket::From400To800
        } else {
            Bucket::Over800
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Bucket {
    type Err = MapError;

    fn from_str(s: &str) -> StatusOr<Self> {
        Bucket::ALL.into_iter()
            .find(|bucket| bucket.key() == s)
            .ok_or_else(|| MapError::StyleError(format!("unknown bucket {:?}", s)))
    }
}

/// One value per bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BucketMap<T>([T; 6]);

impl<T: Copy> BucketMap<T> {
    /// Values in [`Bucket::ALL`] order.
    pub const fn new(values: [T; 6]) -> Self {
        Self(values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Bucket, T)> + '_ {
        Bucket::ALL.into_iter().map(move |bucket| (bucket, self[bucket]))
    }
}

impl<T> Index<Bucket> for BucketMap<T> {
    type Output = T;

    fn index(&self, bucket: Bucket) -> &T {
        &self.0[bucket.index()]
    }
}

impl<T> IndexMut<Bucket> for BucketMap<T> {
    fn index_mut(&mut self, bucket: Bucket) -> &mut T {
        &mut self.0[bucket.index()]
    }
}

pub const DEFAULT_COLORS: BucketMap<Color> = BucketMap::new([
    Color::rgb(0xd4, 0x0a, 0x47),
    Color::rgb(0xe7, 0x81, 0x19),
    Color::rgb(0x30, 0xba, 0xb0),
    Color::rgb(0xbb, 0xbb, 0xbb),
    Color::rgb(0xff, 0xff, 0xff),
    Color::rgb(0xff, 0xff, 0xff),
]);

pub const DEFAULT_WIDTHS: BucketMap<f32> = BucketMap::new([0.3, 0.45, 0.6, 0.75, 0.5, 0.8]);

/// Color and width per bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StyleTable {
    pub colors: BucketMap<Color>,
    pub widths: BucketMap<f32>,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self { colors: DEFAULT_COLORS, widths: DEFAULT_WIDTHS }
    }
}

impl StyleTable {
    pub fn legend_entries(&self) -> Vec<LegendEntry> {
        self.colors.iter()
            .map(|(bucket, color)| LegendEntry::new(bucket.label(), color))
            .collect()
    }
}

/// Pick the bucket for one edge.
///
/// Missing lengths count as `>800`. A road class containing "primary"
/// overrides the length bucket.
pub fn bucket_for(attributes: &EdgeAttributes) -> Bucket {
    let is_primary = attributes.highway.as_ref()
        .is_some_and(|highway| highway.contains("primary"));
    if is_primary {
        return Bucket::Primary;
    }
    attributes.length.map_or(Bucket::Over800, Bucket::for_length)
}

/// Parallel per-edge colors and widths.
pub fn classify_road_segments<'a, I>(edges: I, table: &StyleTable) -> (Vec<Color>, Vec<f32>)
where
    I: IntoIterator<Item = &'a EdgeAttributes>,
{
    edges.into_iter()
        .map(|attributes| {
            let bucket = bucket_for(attributes);
            (table.colors[bucket], table.widths[bucket])
        })
        .unzip()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Preset {
    #[default]
    None,
    Minimal,
    Bold,
    Midnight,
}

/// Colors and background a preset imposes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PresetStyle {
    pub colors: BucketMap<Color>,
    pub background: Color,
}

impl Preset {
    pub fn style(self) -> Option<PresetStyle> {
        match self {
            Preset::None => None,
            Preset::Minimal => Some(PresetStyle {
                colors: BucketMap::new([
                    Color::rgb(0xcc, 0xcc, 0xcc),
                    Color::rgb(0xbb, 0xbb, 0xbb),
                    Color::rgb(0x99, 0x99, 0x99),
                    Color::rgb(0x77, 0x77, 0x77),
                    Color::rgb(0x55, 0x55, 0x55),
                    Color::rgb(0x00, 0x00, 0x00),
                ]),
                background: Color::rgb(0xff, 0xff, 0xff),
            }),
            Preset::Bold => Some(PresetStyle {
                colors: DEFAULT_COLORS,
                background: DEFAULT_BACKGROUND,
            }),
            Preset::Midnight => Some(PresetStyle {
                colors: BucketMap::new([
                    Color::rgb(0x5d, 0xd3, 0x9e),
                    Color::rgb(0x34, 0x8a, 0xa7),
                    Color::rgb(0x52, 0x51, 0x74),
                    Color::rgb(0x51, 0x3b, 0x56),
                    Color::rgb(0x6c, 0x8e, 0xad),
                    Color::rgb(0xff, 0xff, 0xff),
                ]),
                background: Color::rgb(0x06, 0x15, 0x29),
            }),
        }
    }
}

/// Sparse per-bucket overrides on top of the default table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleOverrides {
    #[serde(default)]
    pub colors: HashMap<Bucket, Color>,
    #[serde(default)]
    pub widths: HashMap<Bucket, f32>,
}

impl StyleOverrides {
    /// Apply on top of `table`. Widths must lie within the slider range.
    pub fn apply_to(&self, table: &mut StyleTable) -> StatusOr<()> {
        for (&bucket, &color) in &self.colors {
            table.colors[bucket] = color;
        }
        for (&bucket, &width) in &self.widths {
            if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
                return Err(MapError::StyleError(format!(
                    "width {} for {} is outside {}..={}", width, bucket, MIN_WIDTH, MAX_WIDTH)));
            }
            table.widths[bucket] = width;
        }
        Ok(())
    }
}

/// Everything the user chose about how the map looks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    pub preset: Preset,
    pub transparent: bool,
    pub background: Color,
    pub legend: bool,
    pub overrides: StyleOverrides,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            preset: Preset::None,
            transparent: false,
            background: DEFAULT_BACKGROUND,
            legend: true,
            overrides: StyleOverrides::default(),
        }
    }
}

/// Final table and background after presets and overrides.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedStyle {
    pub table: StyleTable,
    pub background: Background,
    pub legend: bool,
}

impl StyleOptions {
    /// Custom overrides first, then the preset: a preset replaces all six
    /// colors and the background, but never a transparent background.
    pub fn resolve(&self) -> StatusOr<ResolvedStyle> {
        let mut table = StyleTable::default();
        self.overrides.apply_to(&mut table)?;

        let mut background = self.background;
        if let Some(preset) = self.preset.style() {
            table.colors = preset.colors;
            background = preset.background;
        }

        let background = if self.transparent {
            Background::Transparent
        } else {
            Background::Solid(background)
        };

        Ok(ResolvedStyle { table, background, legend: self.legend })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Highway;

    fn edge(length: Option<f64>, highway: Option<Highway>) -> EdgeAttributes {
        EdgeAttributes { length, highway, ..EdgeAttributes::default() }
    }

    fn single(tag: &str) -> Option<Highway> {
        Some(Highway::Single(tag.to_string()))
    }

    #[test]
    fn bucket_boundaries_are_inclusive_on_the_upper_end() {
        assert_eq!(bucket_for(&edge(Some(0.0), None)), Bucket::Under100);
        assert_eq!(bucket_for(&edge(Some(100.0), None)), Bucket::Under100);
        assert_eq!(bucket_for(&edge(Some(100.01), None)), Bucket::From100To200);
        assert_eq!(bucket_for(&edge(Some(200.0), None)), Bucket::From100To200);
        assert_eq!(bucket_for(&edge(Some(400.0), None)), Bucket::From200To400);
        assert_eq!(bucket_for(&edge(Some(800.0), None)), Bucket::From400To800);
        assert_eq!(bucket_for(&edge(Some(800.5), None)), Bucket::Over800);
    }

    #[test]
    fn primary_tag_overrides_length() {
        assert_eq!(bucket_for(&edge(Some(50.0), single("primary"))), Bucket::Primary);
        assert_eq!(bucket_for(&edge(Some(5000.0), single("primary_link"))), Bucket::Primary);
        assert_eq!(bucket_for(&edge(Some(50.0), single("residential"))), Bucket::Under100);
        // Case-sensitive
        assert_eq!(bucket_for(&edge(Some(50.0), single("Primary"))), Bucket::Under100);
    }

    #[test]
    fn missing_length_is_the_longest_bucket() {
        assert_eq!(bucket_for(&edge(None, None)), Bucket::Over800);
        assert_eq!(bucket_for(&edge(None, single("secondary"))), Bucket::Over800);
        assert_eq!(bucket_for(&edge(None, single("primary"))), Bucket::Primary);
    }

    #[test]
    fn tag_lists_match_whole_elements() {
        let mixed = Some(Highway::Multiple(vec!["primary".to_string(), "secondary".to_string()]));
        assert_eq!(bucket_for(&edge(Some(10.0), mixed)), Bucket::Primary);

        let links = Some(Highway::Multiple(vec!["primary_link".to_string(), "tertiary".to_string()]));
        assert_eq!(bucket_for(&edge(Some(10.0), links)), Bucket::Under100);
    }

    #[test]
    fn classify_returns_parallel_sequences() {
        let edges = vec![
            edge(Some(50.0), None),
            edge(Some(150.0), None),
            edge(Some(900.0), single("primary")),
            edge(None, None),
        ];
        let (colors, widths) = classify_road_segments(&edges, &StyleTable::default());

        assert_eq!(colors.len(), 4);
        assert_eq!(colors[0], DEFAULT_COLORS[Bucket::Under100]);
        assert_eq!(colors[1], DEFAULT_COLORS[Bucket::From100To200]);
        assert_eq!(widths, vec![0.3, 0.45, 0.8, 0.5]);
    }

    #[test]
    fn bucket_keys_round_trip_through_strings() {
        for bucket in Bucket::ALL {
            assert_eq!(bucket.key().parse::<Bucket>().unwrap(), bucket);
            let json = serde_json::to_string(&bucket).unwrap();
            assert_eq!(json, format!("\"{}\"", bucket.key()));
        }
        assert!("motorway".parse::<Bucket>().is_err());
    }

    #[test]
    fn midnight_overrides_custom_colors_and_background() {
        let mut options = StyleOptions { preset: Preset::Midnight, ..StyleOptions::default() };
        options.overrides.colors.insert(Bucket::Under100, Color::rgb(1, 2, 3));
        options.overrides.widths.insert(Bucket::Under100, 1.5);
        options.background = Color::rgb(9, 9, 9);

        let resolved = options.resolve().unwrap();

        assert_eq!(resolved.background, Background::Solid(Color::rgb(0x06, 0x15, 0x29)));
        let expected = ["#5dd39e", "#348aa7", "#525174", "#513b56", "#6c8ead", "#ffffff"];
        for ((_, color), hex) in resolved.table.colors.iter().zip(expected) {
            assert_eq!(color.to_string(), hex);
        }
        // Widths are not part of a preset
        assert_eq!(resolved.table.widths[Bucket::Under100], 1.5);
    }

    #[test]
    fn transparent_background_survives_presets() {
        let options = StyleOptions {
            preset: Preset::Midnight,
            transparent: true,
            ..StyleOptions::default()
        };
        let resolved = options.resolve().unwrap();
        assert_eq!(resolved.background, Background::Transparent);
        assert_eq!(resolved.table.colors[Bucket::Under100], Color::rgb(0x5d, 0xd3, 0x9e));
    }

    #[test]
    fn no_preset_keeps_custom_choices() {
        let mut options = StyleOptions { background: Color::rgb(1, 1, 1), ..StyleOptions::default() };
        options.overrides.colors.insert(Bucket::Primary, Color::rgb(255, 0, 0));

        let resolved = options.resolve().unwrap();

        assert_eq!(resolved.background, Background::Solid(Color::rgb(1, 1, 1)));
        assert_eq!(resolved.table.colors[Bucket::Primary], Color::rgb(255, 0, 0));
        assert_eq!(resolved.table.colors[Bucket::Under100], DEFAULT_COLORS[Bucket::Under100]);
    }

    #[test]
    fn out_of_range_widths_are_rejected() {
        let mut overrides = StyleOverrides::default();
        overrides.widths.insert(Bucket::Over800, 0.05);
        assert!(overrides.apply_to(&mut StyleTable::default()).is_err());
    }

    #[test]
    fn legend_lists_all_buckets_in_order() {
        let labels: Vec<_> = StyleTable::default().legend_entries()
            .into_iter()
            .map(|entry| entry.label)
            .collect();
        assert_eq!(labels, ["Length < 100 m", "100-200 m", "200-400 m", "400-800 m", "> 800 m", "Primary"]);
    }
}
