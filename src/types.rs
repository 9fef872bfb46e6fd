use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

pub const DIRECTIONS: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dir: Direction) -> Self {
        match dir {
            Direction::Up => Self::new(self.x, self.y - 1),
            Direction::Down => Self::new(self.x, self.y + 1),
            Direction::Left => Self::new(self.x - 1, self.y),
            Direction::Right => Self::new(self.x + 1, self.y),
        }
    }
}

pub fn manhattan(a: Vec2, b: Vec2) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Wall {
    #[default]
    Empty,
    Solid,
    Glass,
    Door,
    Locked {
        #[serde(rename = "requiredKeys")]
        required_keys: i32,
    },
    OneWay {
        direction: Direction,
    },
    LetterDoor {
        letter: char,
        #[serde(rename = "isOpen")]
        is_open: bool,
    },
}

impl Wall {
    pub fn blocks_player(&self, dir: Direction, keys: i32) -> bool {
        match self {
            Wall::Empty | Wall::Door => false,
            Wall::Solid | Wall::Glass => true,
            Wall::Locked { required_keys } => keys < *required_keys,
            Wall::OneWay { direction } => *direction != dir,
            Wall::LetterDoor { is_open, .. } => !is_open,
        }
    }

    /// Ghosts pass only fully open edges; they never evaluate keys or
    /// one-way directions.
    pub fn blocks_ghost(&self) -> bool {
        !matches!(self, Wall::Empty | Wall::LetterDoor { is_open: true, .. })
    }

    pub fn blocks_ghost_sight(&self) -> bool {
        !matches!(
            self,
            Wall::Empty | Wall::Glass | Wall::LetterDoor { is_open: true, .. }
        )
    }

    /// Fog-of-war rays continue only through empty edges and glass.
    pub fn blocks_ray(&self) -> bool {
        !matches!(self, Wall::Empty | Wall::Glass)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Exploration,
    DeathLoop,
}

impl GameMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "exploration" => Some(Self::Exploration),
            "death_loop" | "death-loop" => Some(Self::DeathLoop),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathReason {
    Ghost,
    StaminaDepleted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Move(Direction),
    UseStair,
    PressButton(char),
    Revive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Key,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub x: i32,
    pub y: i32,
    pub kind: ItemKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub letter: char,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StairDirection {
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stair {
    pub x: i32,
    pub y: i32,
    pub layer: usize,
    pub direction: StairDirection,
}

impl Stair {
    pub fn target_layer(&self) -> Option<usize> {
        match self.direction {
            StairDirection::Up => Some(self.layer + 1),
            StairDirection::Down => self.layer.checked_sub(1),
        }
    }
}

/// One step of a movement trail: where the actor stood before the move and
/// the step counter at that moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TrailPoint {
    pub x: i32,
    pub y: i32,
    pub step: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ghost {
    pub x: i32,
    pub y: i32,
    pub id: u32,
    pub trail: Vec<TrailPoint>,
}

impl Ghost {
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// HUD fields for the renderer, mode-dependent.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StatusView {
    Exploration {
        hp: i32,
        keys: i32,
        steps: i32,
    },
    DeathLoop {
        #[serde(rename = "loopCount")]
        loop_count: i32,
        keys: i32,
        stamina: i32,
    },
}

/// Overlay selection data for the host UI.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct OutcomeView {
    #[serde(rename = "isWon")]
    pub is_won: bool,
    #[serde(rename = "isDead")]
    pub is_dead: bool,
    #[serde(rename = "deathReason")]
    pub death_reason: Option<DeathReason>,
    #[serde(rename = "ghostNearby")]
    pub ghost_nearby: bool,
}
