use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while laying out the squares lattice.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LatticeError {
    #[error("row {index} is outside the lattice (0..{rows})")]
    RowOutOfRange { index: usize, rows: usize },
    #[error("long rows must contain at least one cube")]
    EmptyRow,
}

/// Constants describing the repeating cube/beam motif.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeConfig {
    pub square_size: f32,
    pub rectangle_height: f32,
    pub long_row_length: usize,
    pub row_count: usize,
    /// Distance between neighbouring cubes and between rows.
    pub spacing: f32,
    pub beam_thickness: f32,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            square_size: 1.0,
            rectangle_height: 7.0,
            long_row_length: 5,
            row_count: 20,
            spacing: 3.0,
            beam_thickness: 0.1,
        }
    }
}

/// Long thin box bridging one edge of a row's rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    /// Euler rotation in radians.
    pub rotation: Vec3,
    pub coords: Vec3,
}

/// Cube positions and beams for a single depth slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowLayout {
    pub index: usize,
    pub top: Vec<Vec3>,
    pub middle: [Vec3; 2],
    pub bottom: Vec<Vec3>,
    pub beams: [Beam; 4],
}

impl RowLayout {
    /// Cube positions in placement order: top band, middle endpoints, bottom band.
    pub fn cube_positions(&self) -> Vec<Vec3> {
        self.top
            .iter()
            .chain(self.middle.iter())
            .chain(self.bottom.iter())
            .copied()
            .collect()
    }
}

impl LatticeConfig {
    pub fn row_z(&self, index: usize) -> f32 {
        -((index + 1) as f32) * self.spacing
    }

    /// Evenly spaced x offsets centred on zero, shared by the top and bottom bands.
    pub fn horizontal_offsets(&self) -> Vec<f32> {
        let centre = (self.long_row_length as f32 - 1.0) / 2.0;
        (0..self.long_row_length)
            .map(|slot| (slot as f32 - centre) * self.spacing)
            .collect()
    }

    pub fn cubes_per_row(&self) -> usize {
        2 * self.long_row_length + 2
    }

    /// Computes the layout of row `index`.
    pub fn row(&self, index: usize) -> Result<RowLayout, LatticeError> {
        if self.long_row_length == 0 {
            return Err(LatticeError::EmptyRow);
        }
        if index >= self.row_count {
            return Err(LatticeError::RowOutOfRange {
                index,
                rows: self.row_count,
            });
        }

        let z = self.row_z(index);
        let half_height = self.rectangle_height / 2.0;
        let offsets = self.horizontal_offsets();
        let left = offsets[0];
        let right = offsets[offsets.len() - 1];

        let band = |y: f32| offsets.iter().map(|&x| Vec3::new(x, y, z)).collect();

        Ok(RowLayout {
            index,
            top: band(half_height),
            middle: [Vec3::new(left, 0.0, z), Vec3::new(right, 0.0, z)],
            bottom: band(-half_height),
            beams: self.beams(z, right.abs().max(left.abs())),
        })
    }

    /// Iterates over every row of the lattice.
    pub fn rows(&self) -> impl Iterator<Item = Result<RowLayout, LatticeError>> + '_ {
        (0..self.row_count).map(move |index| self.row(index))
    }

    fn beams(&self, z: f32, outer: f32) -> [Beam; 4] {
        let half_height = self.rectangle_height / 2.0;
        let long = |y: f32| Beam {
            width: outer * 2.0,
            height: self.beam_thickness,
            depth: self.beam_thickness,
            rotation: Vec3::ZERO,
            coords: Vec3::new(0.0, y, z),
        };
        let short = |x: f32| Beam {
            width: self.rectangle_height,
            height: self.beam_thickness,
            depth: self.beam_thickness,
            rotation: Vec3::new(0.0, 0.0, FRAC_PI_2),
            coords: Vec3::new(x, 0.0, z),
        };
        [long(half_height), short(-outer), long(-half_height), short(outer)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3::new(x, y, z)
    }

    #[test]
    fn first_row_matches_reference_layout() {
        let row = LatticeConfig::default().row(0).unwrap();
        assert_eq!(
            row.top,
            vec![
                v(-6.0, 3.5, -3.0),
                v(-3.0, 3.5, -3.0),
                v(0.0, 3.5, -3.0),
                v(3.0, 3.5, -3.0),
                v(6.0, 3.5, -3.0),
            ]
        );
        assert_eq!(row.middle, [v(-6.0, 0.0, -3.0), v(6.0, 0.0, -3.0)]);
        assert_eq!(
            row.bottom,
            vec![
                v(-6.0, -3.5, -3.0),
                v(-3.0, -3.5, -3.0),
                v(0.0, -3.5, -3.0),
                v(3.0, -3.5, -3.0),
                v(6.0, -3.5, -3.0),
            ]
        );
    }

    #[test]
    fn beams_frame_the_row() {
        let row = LatticeConfig::default().row(2).unwrap();
        let [top, left, bottom, right] = row.beams;
        assert_eq!(top.width, 12.0);
        assert_eq!(top.coords, v(0.0, 3.5, -9.0));
        assert_eq!(bottom.coords, v(0.0, -3.5, -9.0));
        assert_eq!(left.width, 7.0);
        assert_eq!(left.coords, v(-6.0, 0.0, -9.0));
        assert_eq!(right.coords, v(6.0, 0.0, -9.0));
        assert_eq!(left.rotation.z, FRAC_PI_2);
        assert_eq!(top.rotation, Vec3::ZERO);
    }

    #[test]
    fn rejects_rows_past_the_end() {
        let config = LatticeConfig::default();
        assert_eq!(
            config.row(20),
            Err(LatticeError::RowOutOfRange { index: 20, rows: 20 })
        );
    }

    #[test]
    fn rejects_empty_long_rows() {
        let config = LatticeConfig {
            long_row_length: 0,
            ..LatticeConfig::default()
        };
        assert_eq!(config.row(0), Err(LatticeError::EmptyRow));
    }

    #[test]
    fn offsets_follow_row_length() {
        let config = LatticeConfig {
            long_row_length: 4,
            ..LatticeConfig::default()
        };
        assert_eq!(config.horizontal_offsets(), vec![-4.5, -1.5, 1.5, 4.5]);
        assert_eq!(config.row(0).unwrap().cube_positions().len(), 10);
    }
}
