//! Staged map build.
//!
//! Every call to [`MapBuilder::step`] runs exactly one stage and returns, so
//! the caller decides when the next one runs. Label refinement runs one
//! placement pass per step until the engine settles.

use crate::color::HeightMap;
use crate::config::MapConfig;
use crate::errors::{MapError, Result};
use crate::label_placement::LabelPlacement;
use crate::organizer::SegmentOrganizer;
use crate::save_file::SaveFile;
use crate::scene::{
    self, Background, BuildingShape, DistrictLabel, GridLine, Scene, StrokeLayer, TransitLayer,
};
use crate::terrain::{bake_forests, bake_terrain};
use log::{info, warn};
use std::fmt;

const STAGE_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Terrain,
    Grid,
    Districts,
    Buildings,
    Roads,
    Transit,
    StopsSeed,
    StopsRefine,
    Done,
}

impl TryFrom<usize> for Stage {
    type Error = MapError;

    fn try_from(value: usize) -> Result<Self> {
        match value {
            0 => Ok(Stage::Terrain),
            1 => Ok(Stage::Grid),
            2 => Ok(Stage::Districts),
            3 => Ok(Stage::Buildings),
            4 => Ok(Stage::Roads),
            5 => Ok(Stage::Transit),
            6 => Ok(Stage::StopsSeed),
            7 => Ok(Stage::StopsRefine),
            8 => Ok(Stage::Done),
            _ => Err(MapError::UnknownStage(value)),
        }
    }
}

impl Stage {
    pub fn index(self) -> usize {
        self as usize
    }

    fn subject(self) -> &'static str {
        match self {
            Stage::Terrain => "terrain",
            Stage::Grid => "grid",
            Stage::Districts => "districts",
            Stage::Buildings => "buildings",
            Stage::Roads => "roads",
            Stage::Transit => "transit routes",
            Stage::StopsSeed => "stop labels",
            Stage::StopsRefine => "stop label layout",
            Stage::Done => "map",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}/{}) building {}...",
            (self.index() + 1).min(STAGE_COUNT),
            STAGE_COUNT,
            self.subject()
        )
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    /// `next` runs on the following call to `step`.
    Continue { next: Stage, status: String },
    Finished { scene: Box<Scene>, status: String },
}

pub struct MapBuilder {
    save: SaveFile,
    config: MapConfig,
    bake_rasters: bool,
    stage: usize,
    organizer: SegmentOrganizer,
    placement: LabelPlacement,
    label_passes: usize,

    background: Background,
    grid: Vec<GridLine>,
    districts: Vec<DistrictLabel>,
    buildings: Vec<BuildingShape>,
    roads: StrokeLayer,
    transit: TransitLayer,
}

impl MapBuilder {
    /// Resolves the save into a network model. Dangling references fail
    /// here, before any stage runs.
    pub fn new(save: SaveFile, config: MapConfig) -> Result<Self> {
        let organizer = SegmentOrganizer::load(&save, &config)?;
        let placement = LabelPlacement::new(&config);
        Ok(Self {
            save,
            config,
            bake_rasters: true,
            stage: 0,
            organizer,
            placement,
            label_passes: 0,
            background: Background::default(),
            grid: Vec::new(),
            districts: Vec::new(),
            buildings: Vec::new(),
            roads: StrokeLayer::default(),
            transit: TransitLayer::default(),
        })
    }

    pub fn with_rasters(mut self, bake_rasters: bool) -> Self {
        self.bake_rasters = bake_rasters;
        self
    }

    pub fn current_stage(&self) -> Result<Stage> {
        Stage::try_from(self.stage)
    }

    pub fn label_passes(&self) -> usize {
        self.label_passes
    }

    pub fn organizer(&self) -> &SegmentOrganizer {
        &self.organizer
    }

    fn advance(&mut self) -> Result<StepOutcome> {
        self.stage += 1;
        let next = Stage::try_from(self.stage)?;
        let status = next.to_string();
        info!("{}", status);
        Ok(StepOutcome::Continue { next, status })
    }

    /// Runs the current stage. Calling again after `Finished` is an error.
    pub fn step(&mut self) -> Result<StepOutcome> {
        match Stage::try_from(self.stage)? {
            Stage::Terrain => {
                if self.bake_rasters {
                    self.bake_background()?;
                }
                self.advance()
            }
            Stage::Grid => {
                self.grid = scene::build_grid(&self.config);
                self.advance()
            }
            Stage::Districts => {
                self.districts = scene::build_districts(&self.save.districts, &self.config);
                for label in scene::district_obstacles(&self.districts) {
                    self.placement.add_fixed_label(label);
                }
                self.advance()
            }
            Stage::Buildings => {
                self.buildings = scene::build_buildings(&self.save.buildings);
                self.advance()
            }
            Stage::Roads => {
                self.roads = self.organizer.build_roads();
                self.advance()
            }
            Stage::Transit => {
                self.transit = self.organizer.build_transit_routes()?;
                self.advance()
            }
            Stage::StopsSeed => {
                self.organizer.seed_stop_labels(&mut self.placement);
                self.advance()
            }
            Stage::StopsRefine => self.refine_labels(),
            Stage::Done => self.finish(),
        }
    }

    fn bake_background(&mut self) -> Result<()> {
        let sea_level = self.save.sea_level.unwrap_or_default();
        if let Some(samples) = &self.save.terrain {
            let raster = bake_terrain(samples, sea_level, &HeightMap::default(), &self.config)?;
            self.background.terrain = Some(raster);
        }
        if !self.save.forest_rows.is_empty() {
            self.background.forests = Some(bake_forests(&self.save.forest_rows, &self.config)?);
        }
        Ok(())
    }

    fn refine_labels(&mut self) -> Result<StepOutcome> {
        self.placement = std::mem::take(&mut self.placement).generate();
        self.label_passes += 1;

        if self.placement.chosen_candidates().is_empty() {
            info!("Stop labels settled after {} passes", self.label_passes);
            return self.advance();
        }

        if self.label_passes >= self.config.max_label_passes {
            let dropped = self.placement.abandon_remaining();
            warn!(
                "Stopped placing stop labels after {} passes, {} candidates left unplaced",
                self.label_passes, dropped
            );
            return self.advance();
        }

        Ok(StepOutcome::Continue {
            next: Stage::StopsRefine,
            status: format!(
                "{} ({} candidates left)",
                Stage::StopsRefine,
                self.placement.candidate_labels().len()
            ),
        })
    }

    fn finish(&mut self) -> Result<StepOutcome> {
        // Nothing valid follows Done
        self.stage += 1;

        let stops = self
            .organizer
            .create_stop_markers(self.placement.fixed_labels());
        let routes = self.organizer.routes();
        let transit = std::mem::take(&mut self.transit);

        let scene = Scene {
            city_name: self.save.city.clone(),
            saved_at: self.save.generated.clone(),
            view_box: scene::view_box(&self.config),
            background: std::mem::take(&mut self.background),
            grid: std::mem::take(&mut self.grid),
            districts: std::mem::take(&mut self.districts),
            buildings: std::mem::take(&mut self.buildings),
            roads: std::mem::take(&mut self.roads),
            legend: scene::build_legend(routes),
            route_toggles: scene::build_route_toggles(routes, &transit, &stops),
            transit,
            stops,
        };

        let status = match &self.save.generated {
            Some(generated) => format!("As saved on {}", generated),
            None => "Map complete".to_string(),
        };
        info!("{}", status);

        Ok(StepOutcome::Finished {
            scene: Box::new(scene),
            status,
        })
    }

    /// Steps until the scene is finished, without yielding.
    pub fn run_to_completion(mut self) -> Result<Scene> {
        loop {
            if let StepOutcome::Finished { scene, .. } = self.step()? {
                return Ok(*scene);
            }
        }
    }
}

/// Builds the scene on the current tokio runtime, yielding to other tasks
/// between stages and between label passes.
pub async fn build_map(save: SaveFile, config: MapConfig, bake_rasters: bool) -> Result<Scene> {
    let mut builder = MapBuilder::new(save, config)?.with_rasters(bake_rasters);
    info!("{}", Stage::Terrain);
    loop {
        match builder.step()? {
            StepOutcome::Continue { .. } => tokio::task::yield_now().await,
            StepOutcome::Finished { scene, .. } => return Ok(*scene),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_indices_round_trip() {
        for i in 0..=8 {
            assert_eq!(Stage::try_from(i).unwrap().index(), i);
        }
        assert!(matches!(
            Stage::try_from(9),
            Err(MapError::UnknownStage(9))
        ));
    }

    #[test]
    fn test_status_lines() {
        assert_eq!(Stage::Terrain.to_string(), "(1/8) building terrain...");
        assert_eq!(Stage::Roads.to_string(), "(5/8) building roads...");
        assert_eq!(Stage::Done.to_string(), "(8/8) building map...");
    }

    #[test]
    fn test_empty_save_builds() {
        let builder = MapBuilder::new(SaveFile::default(), MapConfig::default()).unwrap();
        let scene = builder.run_to_completion().unwrap();
        assert!(scene.roads.is_empty());
        assert!(scene.transit.paths.is_empty());
        assert!(scene.stops.is_empty());
        assert_eq!(scene.grid.len(), 18);
        assert!(scene.background.terrain.is_none());
    }

    #[test]
    fn test_step_past_done_is_an_error() {
        let mut builder = MapBuilder::new(SaveFile::default(), MapConfig::default()).unwrap();
        let mut stages = Vec::new();
        loop {
            match builder.step().unwrap() {
                StepOutcome::Continue { next, .. } => stages.push(next),
                StepOutcome::Finished { status, .. } => {
                    assert_eq!(status, "Map complete");
                    break;
                }
            }
        }
        assert_eq!(stages.first(), Some(&Stage::Grid));
        assert_eq!(stages.last(), Some(&Stage::Done));
        assert!(matches!(builder.step(), Err(MapError::UnknownStage(9))));
    }
}
