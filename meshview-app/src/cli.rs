//! Command line

use clap::{Parser, ValueEnum};
use meshview_core::{LayoutMode, ViewerConfig};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    /// One viewport; every open replaces the model
    Single,
    /// A grid of viewports, one model each
    Multi,
}

/// Zero-configuration viewer for OBJ, FBX, GLTF/GLB and STL models
#[derive(Debug, Parser)]
#[command(name = "meshview", version, about)]
pub struct Cli {
    /// Model to open at startup
    pub file: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "single")]
    pub layout: LayoutArg,

    /// Allow panning with the right or middle mouse button
    #[arg(long)]
    pub pan: bool,

    /// Reject .stl files
    #[arg(long)]
    pub no_stl: bool,

    #[arg(long)]
    pub no_auto_rotate: bool,

    #[arg(long)]
    pub no_shadows: bool,

    /// Disable 4x multisampling
    #[arg(long)]
    pub no_msaa: bool,
}

impl Cli {
    pub fn viewer_config(&self) -> ViewerConfig {
        let mut config = ViewerConfig {
            layout: match self.layout {
                LayoutArg::Single => LayoutMode::Single,
                LayoutArg::Multi => LayoutMode::Multi,
            },
            enable_stl: !self.no_stl,
            shadows: !self.no_shadows,
            multisampling: !self.no_msaa,
            ..ViewerConfig::default()
        };
        config.controls.enable_pan = self.pan;
        config.controls.auto_rotate = !self.no_auto_rotate;
        config
    }
}
