use research_core::PropType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub team: Option<Team>,
}

impl Player {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Per-game season averages. Numeric fields are optional because the API
/// omits them for players without qualifying minutes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonAverages {
    pub player_id: u64,
    pub season: i32,
    #[serde(default)]
    pub games_played: u32,
    #[serde(default)]
    pub min: Option<String>,
    #[serde(default)]
    pub pts: Option<f64>,
    #[serde(default)]
    pub ast: Option<f64>,
    #[serde(default)]
    pub reb: Option<f64>,
    #[serde(default)]
    pub stl: Option<f64>,
    #[serde(default)]
    pub blk: Option<f64>,
    #[serde(default)]
    pub fg3m: Option<f64>,
}

impl SeasonAverages {
    pub fn value_for(&self, prop_type: PropType) -> Option<f64> {
        match prop_type {
            PropType::Points => self.pts,
            PropType::Assists => self.ast,
            PropType::Rebounds => self.reb,
            PropType::Steals => self.stl,
            PropType::Blocks => self.blk,
            PropType::Threes => self.fg3m,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRef {
    pub id: u64,
    pub date: String,
    #[serde(default)]
    pub season: Option<i32>,
}

/// One player's box-score line for one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStat {
    pub id: u64,
    #[serde(default)]
    pub min: Option<String>,
    #[serde(default)]
    pub pts: Option<f64>,
    #[serde(default)]
    pub ast: Option<f64>,
    #[serde(default)]
    pub reb: Option<f64>,
    #[serde(default)]
    pub stl: Option<f64>,
    #[serde(default)]
    pub blk: Option<f64>,
    #[serde(default)]
    pub fg3m: Option<f64>,
    pub game: GameRef,
}

impl GameStat {
    pub fn value_for(&self, prop_type: PropType) -> Option<f64> {
        match prop_type {
            PropType::Points => self.pts,
            PropType::Assists => self.ast,
            PropType::Rebounds => self.reb,
            PropType::Steals => self.stl,
            PropType::Blocks => self.blk,
            PropType::Threes => self.fg3m,
        }
    }

    /// Box scores for DNPs come back with "00", "0:00" or no minutes at all.
    pub fn played(&self) -> bool {
        match self.min.as_deref() {
            None => false,
            Some(m) => m
                .split(':')
                .next()
                .and_then(|mins| mins.trim().parse::<u32>().ok())
                .map(|mins| mins > 0)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListMeta {
    #[serde(default)]
    pub next_cursor: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<ListMeta>,
}

impl<T> ListResponse<T> {
    pub(crate) fn next_cursor(&self) -> Option<u64> {
        self.meta.as_ref().and_then(|m| m.next_cursor)
    }
}
