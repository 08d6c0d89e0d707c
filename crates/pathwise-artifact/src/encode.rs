//! Solver results → artifacts.
//!
//! | Encoder | Name | Kind | Payload |
//! |---------|------|------|---------|
//! | [`encode_value_csv`] | `V.csv` | table | `x0,..,value` per grid point |
//! | [`encode_policy_csv`] | `policy.csv` | table | `x0,..,u0,..` per grid point |
//! | [`encode_rollout`] | `rollout.json` | table | rollout trace |
//! | [`encode_density_frame`] | `density_NNN.bin` | frame | binary, see [`codec`](crate::codec) |
//! | [`encode_particles`] | `particles_NNN.json` | particles | snapshot |
//! | [`encode_frames`] | `frames-<n>.json` | frame | `{"format":"sb.frames",..}` |
//! | [`encode_coupling`] | `pi.bin` | table | binary, see [`codec`](crate::codec) |
//! | [`encode_metrics`] | caller-chosen | metrics | JSON object |

use std::fmt::Write as _;

use pathwise_core::{Grid, ValueArray};
use pathwise_diffusion::ParticleSnapshot;
use pathwise_hjb::RolloutTrace;
use pathwise_sb::Frame;
use serde_json::{json, Map, Value};

use crate::artifact::{Artifact, ArtifactData, ArtifactKind};
use crate::codec::{to_u32, write_coupling, write_density};
use crate::error::ArtifactError;

/// `format` tag of the interpolation-frames document.
pub const FRAMES_FORMAT: &str = "sb.frames";
/// `version` of the interpolation-frames document.
pub const FRAMES_VERSION: u32 = 1;

const CSV: &str = "text/csv";
const JSON: &str = "application/json";
const BINARY: &str = "application/octet-stream";

fn csv_header(grid: &Grid, trailing: impl IntoIterator<Item = String>) -> String {
    let mut cols: Vec<String> = (0..grid.ndim()).map(|a| format!("x{a}")).collect();
    cols.extend(trailing);
    let mut out = cols.join(",");
    out.push('\n');
    out
}

fn csv_row(out: &mut String, position: &[f64], values: &[f64]) {
    let mut first = true;
    for v in position.iter().chain(values) {
        if !first {
            out.push(',');
        }
        first = false;
        // Writing into a String cannot fail.
        let _ = write!(out, "{v}");
    }
    out.push('\n');
}

/// One CSV row per grid point: coordinates, then the value.
pub fn encode_value_csv(value: &ValueArray) -> Artifact {
    let grid = value.grid();
    let mut out = csv_header(grid, [String::from("value")]);
    let data = value.as_slice();
    grid.for_each(|flat, _, pos| csv_row(&mut out, pos, &data[flat..=flat]));
    Artifact::new(ArtifactKind::Table, "V.csv", CSV, ArtifactData::Text(out))
}

/// One CSV row per grid point: coordinates, then each control component.
pub fn encode_policy_csv(grid: &Grid, policy: &[Vec<f64>]) -> Result<Artifact, ArtifactError> {
    if policy.len() != grid.len() {
        return Err(ArtifactError::Malformed {
            detail: format!("policy has {} entries, grid has {} cells", policy.len(), grid.len()),
        });
    }
    let width = policy.first().map_or(0, Vec::len);
    if let Some(bad) = policy.iter().position(|u| u.len() != width) {
        return Err(ArtifactError::Malformed {
            detail: format!("policy entry {bad} has a different control dimension"),
        });
    }
    let mut out = csv_header(grid, (0..width).map(|k| format!("u{k}")));
    grid.for_each(|flat, _, pos| csv_row(&mut out, pos, &policy[flat]));
    Ok(Artifact::new(
        ArtifactKind::Table,
        "policy.csv",
        CSV,
        ArtifactData::Text(out),
    ))
}

/// `rollout.json`: the full sample trace.
pub fn encode_rollout(trace: &RolloutTrace) -> Result<Artifact, ArtifactError> {
    Ok(Artifact::new(
        ArtifactKind::Table,
        "rollout.json",
        JSON,
        ArtifactData::Text(serde_json::to_string(trace)?),
    ))
}

/// `density_NNN.bin`: the field narrowed to `f32` behind a shape header.
pub fn encode_density_frame(index: usize, values: &ValueArray) -> Result<Artifact, ArtifactError> {
    let shape = values
        .grid()
        .shape()
        .iter()
        .map(|&s| to_u32("axis length", s))
        .collect::<Result<Vec<_>, _>>()?;
    let bytes = write_density(to_u32("frame index", index)?, &shape, values.as_slice());
    Ok(Artifact::new(
        ArtifactKind::Frame,
        format!("density_{index:03}.bin"),
        BINARY,
        ArtifactData::Bytes(bytes),
    ))
}

/// `particles_NNN.json`: one particle snapshot.
pub fn encode_particles(
    index: usize,
    snapshot: &ParticleSnapshot,
) -> Result<Artifact, ArtifactError> {
    Ok(Artifact::new(
        ArtifactKind::Particles,
        format!("particles_{index:03}.json"),
        JSON,
        ArtifactData::Text(serde_json::to_string(snapshot)?),
    ))
}

/// `frames-<n>.json` where `n` is the frame count.
pub fn encode_frames(frames: &[Frame]) -> Result<Artifact, ArtifactError> {
    let doc = json!({
        "format": FRAMES_FORMAT,
        "version": FRAMES_VERSION,
        "frames": frames,
    });
    Ok(Artifact::new(
        ArtifactKind::Frame,
        format!("frames-{}.json", frames.len()),
        JSON,
        ArtifactData::Text(serde_json::to_string(&doc)?),
    ))
}

/// `pi.bin`: the dense coupling as little-endian `f64`.
pub fn encode_coupling(
    coupling: &[f64],
    rows: usize,
    cols: usize,
) -> Result<Artifact, ArtifactError> {
    if rows.checked_mul(cols) != Some(coupling.len()) {
        return Err(ArtifactError::Malformed {
            detail: format!(
                "coupling has {} entries, expected {rows} x {cols}",
                coupling.len()
            ),
        });
    }
    let bytes = write_coupling(to_u32("rows", rows)?, to_u32("cols", cols)?, coupling);
    Ok(Artifact::new(
        ArtifactKind::Table,
        "pi.bin",
        BINARY,
        ArtifactData::Bytes(bytes),
    ))
}

/// A metrics object under `name`.
pub fn encode_metrics(name: impl Into<String>, map: Map<String, Value>) -> Artifact {
    Artifact::new(ArtifactKind::Metrics, name, JSON, ArtifactData::Map(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_coupling, decode_density_frame};

    fn text(a: &Artifact) -> &str {
        match a.data() {
            ArtifactData::Text(t) => t,
            other => panic!("expected text, got {other:?}"),
        }
    }

    fn line_grid() -> Grid {
        Grid::new(&[3], &[0.5], &[-0.5]).unwrap()
    }

    #[test]
    fn value_csv_lists_every_point() {
        let v = ValueArray::from_vec(line_grid(), vec![1.0, 0.0, 1.0]).unwrap();
        let a = encode_value_csv(&v);
        assert_eq!(a.name(), "V.csv");
        assert_eq!(text(&a), "x0,value\n-0.5,1\n0,0\n0.5,1\n");
    }

    #[test]
    fn policy_csv_columns_follow_control_dimension() {
        let policy = vec![vec![1.0, 0.0], vec![0.0, 0.0], vec![-1.0, 0.5]];
        let a = encode_policy_csv(&line_grid(), &policy).unwrap();
        let lines: Vec<&str> = text(&a).lines().collect();
        assert_eq!(lines[0], "x0,u0,u1");
        assert_eq!(lines[3], "0.5,-1,0.5");
    }

    #[test]
    fn policy_length_is_checked() {
        assert!(encode_policy_csv(&line_grid(), &[vec![0.0]]).is_err());
        let ragged = vec![vec![0.0], vec![0.0, 1.0], vec![0.0]];
        assert!(encode_policy_csv(&line_grid(), &ragged).is_err());
    }

    #[test]
    fn density_frame_is_numbered_and_decodable() {
        let v = ValueArray::from_vec(line_grid(), vec![0.25, 0.5, 0.25]).unwrap();
        let a = encode_density_frame(7, &v).unwrap();
        assert_eq!(a.name(), "density_007.bin");
        let ArtifactData::Bytes(bytes) = a.data() else {
            panic!("expected bytes");
        };
        let frame = decode_density_frame(bytes).unwrap();
        assert_eq!(frame.index, 7);
        assert_eq!(frame.shape, vec![3]);
        assert_eq!(frame.values, vec![0.25f32, 0.5, 0.25]);
    }

    #[test]
    fn frames_document_carries_format_tag() {
        let frames = vec![
            Frame {
                t: 0.0,
                positions: vec![vec![0.0]],
            },
            Frame {
                t: 1.0,
                positions: vec![vec![2.0]],
            },
        ];
        let a = encode_frames(&frames).unwrap();
        assert_eq!(a.name(), "frames-2.json");
        let doc: Value = serde_json::from_str(text(&a)).unwrap();
        assert_eq!(doc["format"], "sb.frames");
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["frames"][1]["positions"][0][0], 2.0);
    }

    #[test]
    fn coupling_round_trips_through_codec() {
        let a = encode_coupling(&[0.5, 0.0, 0.0, 0.5], 2, 2).unwrap();
        let ArtifactData::Bytes(bytes) = a.data() else {
            panic!("expected bytes");
        };
        let pi = decode_coupling(bytes).unwrap();
        assert_eq!((pi.rows, pi.cols), (2, 2));
        assert!(encode_coupling(&[1.0], 2, 2).is_err());
    }

    #[test]
    fn metrics_keep_their_name() {
        let mut map = Map::new();
        map.insert("iterations".into(), json!(12));
        let a = encode_metrics("diagnostics.json", map);
        assert_eq!(a.kind(), ArtifactKind::Metrics);
        assert_eq!(a.name(), "diagnostics.json");
    }
}
