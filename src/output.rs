//! The JSON document handed to the downstream viewer.

use glam::DVec3;
use seer_locate::{Aabb, RunOutput, RunReport, SceneObject, UnlocalizedObservation};
use serde::Serialize;

fn point(v: DVec3) -> [f64; 3] {
    v.to_array()
}

#[derive(Serialize, Debug)]
pub struct Footprint {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl From<&Aabb> for Footprint {
    fn from(aabb: &Aabb) -> Self {
        Self {
            min: point(aabb.min),
            max: point(aabb.max),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ObjectEntry<'a> {
    pub name: &'a str,
    pub anchor: [f64; 3],
    pub footprint: Option<Footprint>,
    pub materials: Vec<&'a str>,
    pub frame_count: usize,
    pub frames: Vec<&'a str>,
    pub observations: usize,
}

impl<'a> From<&'a SceneObject> for ObjectEntry<'a> {
    fn from(object: &'a SceneObject) -> Self {
        Self {
            name: &object.name,
            anchor: point(object.anchor),
            footprint: object.footprint.as_ref().map(Footprint::from),
            materials: object.materials.iter().map(String::as_str).collect(),
            frame_count: object.frame_count(),
            frames: object.frames.iter().map(String::as_str).collect(),
            observations: object.observations,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct UnlocalizedEntry<'a> {
    pub name: &'a str,
    pub materials: Vec<&'a str>,
    pub frames: Vec<&'a str>,
    pub observations: usize,
}

impl<'a> From<&'a UnlocalizedObservation> for UnlocalizedEntry<'a> {
    fn from(observation: &'a UnlocalizedObservation) -> Self {
        Self {
            name: &observation.name,
            materials: observation.materials.iter().map(String::as_str).collect(),
            frames: observation.frames.iter().map(String::as_str).collect(),
            observations: observation.observations,
        }
    }
}

/// Scene objects, unlocalized names and the run report.
#[derive(Serialize, Debug)]
pub struct SceneDocument<'a> {
    pub objects: Vec<ObjectEntry<'a>>,
    pub unlocalized: Vec<UnlocalizedEntry<'a>>,
    pub report: &'a RunReport,
}

impl<'a> SceneDocument<'a> {
    pub fn new(output: &'a RunOutput) -> Self {
        Self {
            objects: output.scene.objects.iter().map(ObjectEntry::from).collect(),
            unlocalized: output
                .scene
                .unlocalized
                .iter()
                .map(UnlocalizedEntry::from)
                .collect(),
            report: &output.report,
        }
    }
}
