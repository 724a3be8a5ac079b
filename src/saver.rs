use crate::actor::{ActorProxy, ActorTable};
use crate::error::Result;
use crate::params::{ActorKey, Role};
use crate::scenario::StatusHeader;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const STATUS_FILE: &str = "status.json";

/// Capture and persistence collaborator driven by the scenario lifecycle.
pub trait Saver {
    /// Register the actor set of the run that just started.
    fn update(&mut self, actors: &ActorTable);

    /// Record one frame of scene status, leaving out `ignored` actors.
    fn capture(&mut self, ignored: &[ActorKey], header: &StatusHeader, status: &Value);

    /// Persist everything captured so far under `path`.
    fn save(&mut self, path: &Path) -> Result<()>;

    /// Drop captured frames; a full reset also forgets the registered actors.
    fn reset(&mut self, full: bool);

    /// Dry mode runs the pipeline without writing to disk.
    fn is_dry_mode(&self) -> bool;

    fn output_dir(&self) -> &Path;
}

pub type SaverHandle = Rc<RefCell<dyn Saver>>;

/// Deterministic snapshot of one actor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorSnapshot {
    pub name: String,
    pub role: Role,
    pub location: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friction_scale: Option<f64>,
}

impl ActorSnapshot {
    pub fn capture(actor: &ActorProxy) -> Result<Self> {
        let transform = actor.transform()?;
        let location = actor.location()?;
        Ok(Self {
            name: actor.key().to_string(),
            role: actor.role(),
            location: location.to_array(),
            rotation: [transform.rotation.pitch, transform.rotation.yaw, transform.rotation.roll],
            scale: transform.scale.to_array(),
            material: actor.material()?.map(|asset| asset.path().to_string()),
            mesh: actor.mesh()?.map(|asset| asset.path().to_string()),
            hidden: actor.is_hidden()?,
            mass: actor.mass()?,
            friction_scale: actor.friction_scale()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapturedFrame {
    pub index: usize,
    pub status: Value,
}

/// Layout of the `status.json` file written per scene or run directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedStatus {
    pub header: Option<StatusHeader>,
    pub actors: Vec<ActorSnapshot>,
    pub frames: Vec<CapturedFrame>,
}

impl SavedStatus {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Writes scene metadata as JSON. Image frames are the host's business.
pub struct JsonSaver {
    output_dir: PathBuf,
    dry_mode: bool,
    actors: Vec<ActorSnapshot>,
    frames: Vec<CapturedFrame>,
    header: Option<StatusHeader>,
    saved: Vec<PathBuf>,
}

impl JsonSaver {
    pub fn new(output_dir: impl Into<PathBuf>, dry_mode: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            dry_mode,
            actors: Vec::new(),
            frames: Vec::new(),
            header: None,
            saved: Vec::new(),
        }
    }

    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    pub fn actors(&self) -> &[ActorSnapshot] {
        &self.actors
    }

    pub fn saved_paths(&self) -> &[PathBuf] {
        &self.saved
    }
}

impl Saver for JsonSaver {
    fn update(&mut self, actors: &ActorTable) {
        self.actors = actors
            .values()
            .filter_map(|actor| match ActorSnapshot::capture(actor) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    log::warn!("skipping {} in saver roster: {err}", actor.key());
                    None
                }
            })
            .collect();
    }

    fn capture(&mut self, ignored: &[ActorKey], header: &StatusHeader, status: &Value) {
        let mut status = status.clone();
        if let Some(actors) = status.get_mut("actors").and_then(Value::as_object_mut) {
            for key in ignored {
                actors.remove(&key.to_string());
            }
        }
        self.frames.push(CapturedFrame { index: self.frames.len(), status });
        self.header = Some(header.clone());
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        if self.dry_mode {
            log::debug!("dry mode, not writing {}", path.display());
            return Ok(());
        }
        fs::create_dir_all(path)?;
        let file = File::create(path.join(STATUS_FILE))?;
        let saved =
            SavedStatus { header: self.header.clone(), actors: self.actors.clone(), frames: self.frames.clone() };
        serde_json::to_writer_pretty(BufWriter::new(file), &saved)?;
        log::info!("saved {} frames to {}", self.frames.len(), path.display());
        self.saved.push(path.to_path_buf());
        Ok(())
    }

    fn reset(&mut self, full: bool) {
        self.frames.clear();
        if full {
            self.actors.clear();
            self.header = None;
        }
    }

    fn is_dry_mode(&self) -> bool {
        self.dry_mode
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
