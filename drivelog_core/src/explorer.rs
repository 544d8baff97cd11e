//! Dataset summaries: the listings a viewer prints, returned as data.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::records::{Attribute, Log, Sample, Token};

/// RGB color of a category in renderings.
pub type Rgb = [u8; 3];

// ============================================================================
// SUMMARY TYPES
// ============================================================================

/// Mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spread {
    pub mean: f64,
    pub std: f64,
}

impl Spread {
    fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { mean: f64::NAN, std: f64::NAN };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self { mean, std: var.sqrt() }
    }
}

/// Box size statistics of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub name: String,
    pub count: usize,
    pub width: Spread,
    pub length: Spread,
    pub height: Spread,
    /// length / width
    pub lw_aspect: Spread,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneSummary {
    pub token: Token,
    pub name: String,
    pub description: String,
    /// First sample time (seconds)
    pub start_time: f64,
    /// Last minus first sample time (seconds)
    pub duration: f64,
    pub location: String,
    pub nbr_annotations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureEntry {
    pub token: Token,
    pub modality: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationEntry {
    pub token: Token,
    pub category: String,
}

/// Keyframes and annotations of one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleListing {
    pub sample_token: Token,
    /// Sorted by channel
    pub captures: Vec<CaptureEntry>,
    pub annotations: Vec<AnnotationEntry>,
}

/// Color used to draw boxes of `category`.
pub fn category_color(category: &str) -> Rgb {
    const VEHICLES: [&str; 5] = ["bus", "car", "construction_vehicle", "trailer", "truck"];

    if category.contains("bicycle") || category.contains("motorcycle") {
        [255, 61, 99]
    } else if category.contains("vehicle") || VEHICLES.contains(&category) {
        [255, 158, 0]
    } else if category.contains("pedestrian") {
        [0, 0, 230]
    } else if category.contains("cone") || category.contains("barrier") {
        [0, 0, 0]
    } else {
        [255, 0, 255]
    }
}

impl Dataset {
    /// Size statistics per annotated category, sorted by name.
    pub fn category_stats(&self) -> Vec<CategoryStats> {
        let mut sizes: BTreeMap<&str, Vec<[f64; 3]>> = BTreeMap::new();
        for (ann, category) in self
            .store()
            .sample_annotation
            .iter()
            .zip(&self.views().annotation_category)
        {
            sizes.entry(category.as_str()).or_default().push(ann.size);
        }

        sizes
            .into_iter()
            .map(|(name, wlh)| {
                let column = |f: fn(&[f64; 3]) -> f64| wlh.iter().map(f).collect::<Vec<_>>();
                CategoryStats {
                    name: name.to_string(),
                    count: wlh.len(),
                    width: Spread::of(&column(|s| s[0])),
                    length: Spread::of(&column(|s| s[1])),
                    height: Spread::of(&column(|s| s[2])),
                    lw_aspect: Spread::of(&column(|s| s[1] / s[0])),
                }
            })
            .collect()
    }

    /// Annotation count per attribute name, sorted by name. Attributes no
    /// annotation carries are not listed.
    pub fn attribute_counts(&self) -> Result<Vec<(String, usize)>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for ann in self.store().sample_annotation.iter() {
            for token in &ann.attribute_tokens {
                let attribute = self.get::<Attribute>(token)?;
                *counts.entry(attribute.name.clone()).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    /// One summary per scene, ordered by start time.
    pub fn scene_summaries(&self) -> Result<Vec<SceneSummary>> {
        let mut summaries = self
            .store()
            .scene
            .iter()
            .map(|scene| {
                let first = self.get::<Sample>(&scene.first_sample_token)?;
                let last = self.get::<Sample>(&scene.last_sample_token)?;
                let log = self.get::<Log>(&scene.log_token)?;

                let mut nbr_annotations = 0;
                let mut cursor = Some(first);
                // Bounded by the sample count so a corrupt chain cannot spin.
                for _ in 0..self.store().sample.len() {
                    let Some(sample) = cursor else { break };
                    nbr_annotations += self.sample_annotations(&sample.token)?.len();
                    if sample.token == last.token {
                        break;
                    }
                    cursor = match &sample.next {
                        Some(next) => Some(self.get::<Sample>(next)?),
                        None => None,
                    };
                }

                Ok(SceneSummary {
                    token: scene.token.clone(),
                    name: scene.name.clone(),
                    description: scene.description.clone(),
                    start_time: first.timestamp * 1e-6,
                    duration: (last.timestamp - first.timestamp) * 1e-6,
                    location: log.location.clone(),
                    nbr_annotations,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        summaries.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Ok(summaries)
    }

    /// Keyframe captures and annotations of a sample.
    pub fn sample_listing(&self, sample_token: &str) -> Result<SampleListing> {
        let captures = self
            .sample_keyframes(sample_token)?
            .values()
            .map(|sd_token| {
                let info = self.sensor_info(sd_token)?;
                Ok(CaptureEntry {
                    token: sd_token.clone(),
                    modality: info.modality.clone(),
                    channel: info.channel.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let annotations = self
            .sample_annotations(sample_token)?
            .iter()
            .map(|token| {
                Ok(AnnotationEntry {
                    token: token.clone(),
                    category: self.category_name(token)?.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SampleListing {
            sample_token: sample_token.to_string(),
            captures,
            annotations,
        })
    }
}
