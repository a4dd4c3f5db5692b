#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that generates caves and previews them.

mod preset_transfer;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use cave_core::{CellCoord, CellType, ParameterSet};
use cave_pattern::MapPattern;
use cave_rendering::RenderMode;
use clap::{Args, Parser, Subcommand};
use log::info;

/// Procedural cave generator.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generates a cave and prints it as ASCII.
    Generate(GenerateArgs),
    /// Decodes a preset transfer string and prints it as TOML.
    Import {
        /// String produced by `generate --export`.
        code: String,
    },
}

/// Flags accepted by `cave generate`. Every override replaces the matching
/// preset field.
#[derive(Args, Debug, Default)]
struct GenerateArgs {
    /// TOML file holding a parameter set.
    #[arg(short, long)]
    preset: Option<PathBuf>,
    /// Seed for the random stream.
    #[arg(short, long)]
    seed: Option<i64>,
    /// Number of columns before subdivision.
    #[arg(long)]
    width: Option<u32>,
    /// Number of rows before subdivision.
    #[arg(long)]
    height: Option<u32>,
    /// Probability that an interior cell starts as floor.
    #[arg(short, long)]
    density: Option<f32>,
    /// Minimum room area before subdivision scaling.
    #[arg(long)]
    min_room: Option<u32>,
    /// Minimum wall area before subdivision scaling.
    #[arg(long)]
    min_wall: Option<u32>,
    /// Writes a PNG preview to this path.
    #[arg(long)]
    png: Option<PathBuf>,
    /// Pixels per cell in the PNG preview.
    #[arg(long, default_value_t = 4)]
    scale: u32,
    /// Colours the PNG preview by region.
    #[arg(long)]
    colored: bool,
    /// Prints the preset transfer string after the map.
    #[arg(long)]
    export: bool,
}

impl GenerateArgs {
    fn apply_overrides(&self, params: &mut ParameterSet) {
        if let Some(seed) = self.seed {
            params.seed = seed;
        }
        if let Some(width) = self.width {
            params.width = width;
        }
        if let Some(height) = self.height {
            params.height = height;
        }
        if let Some(density) = self.density {
            params.fill_density = density;
        }
        if let Some(area) = self.min_room {
            params.min_room_area = area;
        }
        if let Some(area) = self.min_wall {
            params.min_wall_area = area;
        }
    }

    fn parameters(&self) -> Result<ParameterSet> {
        let mut params = match &self.preset {
            Some(path) => load_preset(path)?,
            None => ParameterSet::default(),
        };
        self.apply_overrides(&mut params);
        Ok(params)
    }

    fn render_mode(&self) -> RenderMode {
        if self.colored {
            RenderMode::RegionColored
        } else {
            RenderMode::Monochrome
        }
    }
}

/// Entry point for the cave command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Generate(args) => generate(&args),
        Command::Import { code } => import(&code),
    }
}

fn generate(args: &GenerateArgs) -> Result<()> {
    let params = args.parameters()?;
    let pattern = MapPattern::generate(params).context("failed to generate cave")?;

    print!("{}", ascii_map(&pattern));
    println!("{}", summary(&pattern));

    if let Some(path) = &args.png {
        let preview = cave_rendering::render(&pattern, args.render_mode())?
            .upscaled(args.scale)?;
        cave_rendering::save_png(&preview, path)?;
        info!("wrote {}x{} preview to {}", preview.width(), preview.height(), path.display());
    }

    if args.export {
        println!("{}", preset_transfer::encode(pattern.params())?);
    }
    Ok(())
}

fn import(code: &str) -> Result<()> {
    let params = preset_transfer::decode(code).context("failed to decode preset")?;
    let text = toml::to_string_pretty(&params).context("failed to serialise preset")?;
    print!("{text}");
    Ok(())
}

fn load_preset(path: &Path) -> Result<ParameterSet> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read preset {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse preset {}", path.display()))
}

/// One character per cell: `#` wall, `.` floor, `@` spawn.
fn ascii_map(pattern: &MapPattern) -> String {
    let spawn = pattern.spawn_point();
    let mut out = String::with_capacity(((pattern.width() + 1) * pattern.height()) as usize);

    for (row, cells) in pattern.grid().rows().enumerate() {
        for (column, cell) in cells.iter().enumerate() {
            let coord = CellCoord::new(column as u32, row as u32);
            let glyph = if spawn == Some(coord) {
                '@'
            } else if cell.is(CellType::Floor) {
                '.'
            } else {
                '#'
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}

fn summary(pattern: &MapPattern) -> String {
    let regions = pattern.regions();
    let mut lines = vec![
        format!(
            "{}x{} cells, {} rooms, {} wall regions, stage {}",
            pattern.width(),
            pattern.height(),
            regions.room_count(),
            regions.regions(CellType::Wall).len(),
            pattern.stage()
        ),
        match pattern.spawn_position() {
            Some(position) => format!("spawn at {position}"),
            None => "no spawn".to_owned(),
        },
    ];
    lines.extend(
        pattern
            .warnings()
            .iter()
            .map(|warning| format!("warning: {warning}")),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pattern(seed: i64) -> MapPattern {
        MapPattern::generate(ParameterSet {
            seed,
            width: 24,
            height: 20,
            ..ParameterSet::default()
        })
        .expect("valid parameters")
    }

    #[test]
    fn ascii_map_has_one_glyph_per_cell() {
        let pattern = small_pattern(3);
        let map = ascii_map(&pattern);
        let lines: Vec<&str> = map.lines().collect();

        assert_eq!(lines.len(), 20);
        assert!(lines.iter().all(|line| line.chars().count() == 24));
        assert!(lines[0].chars().all(|glyph| glyph == '#'));
        assert_eq!(
            map.matches('@').count(),
            usize::from(pattern.spawn_point().is_some())
        );
    }

    #[test]
    fn ascii_map_marks_floor_cells() {
        let pattern = small_pattern(8);
        let map = ascii_map(&pattern);
        let floors = pattern.grid().count(CellType::Floor);
        let marked = map.matches('.').count() + map.matches('@').count();

        assert_eq!(marked, floors);
    }

    #[test]
    fn overrides_replace_preset_fields() {
        let args = GenerateArgs {
            seed: Some(42),
            density: Some(0.4),
            min_wall: Some(3),
            ..GenerateArgs::default()
        };
        let mut params = ParameterSet::default();
        args.apply_overrides(&mut params);

        assert_eq!(params.seed, 42);
        assert_eq!(params.fill_density, 0.4);
        assert_eq!(params.min_wall_area, 3);
        assert_eq!(params.width, ParameterSet::default().width);
    }

    #[test]
    fn partial_toml_preset_falls_back_to_defaults() {
        let text = r#"
seed = 7
width = 48

[[refinement_steps]]
iterations = 3
live_threshold = 4
death_threshold = 5
"#;
        let params: ParameterSet = toml::from_str(text).expect("preset parses");

        assert_eq!(params.seed, 7);
        assert_eq!(params.width, 48);
        assert_eq!(params.height, 128);
        assert_eq!(params.refinement_steps.len(), 1);
        assert_eq!(params.refinement_steps[0].death_threshold, 5);
        assert!(!params.refinement_steps[0].subdivide_first);
    }

    #[test]
    fn summary_reports_spawn_and_counts() {
        let pattern = small_pattern(5);
        let text = summary(&pattern);

        assert!(text.starts_with("24x20 cells"));
        if pattern.spawn_point().is_some() {
            assert!(text.contains("spawn at"));
        } else {
            assert!(text.contains("warning"));
        }
    }
}
