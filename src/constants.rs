/// Side length of the always-visible starting room in fixed-layout mazes.
pub const START_ROOM_SIZE: i32 = 3;

pub const DEFAULT_HEALTH: i32 = 3;
pub const DEFAULT_STAMINA: i32 = 100;

pub const MIN_MAP_SIDE: i32 = 2;
pub const MAX_MAP_SIDE: i32 = 64;
pub const MAX_LAYERS: usize = 8;

pub fn default_health() -> i32 {
    DEFAULT_HEALTH
}

pub fn default_stamina() -> i32 {
    DEFAULT_STAMINA
}

/// Default start cell of a fixed-layout maze: the center of the 3x3 start
/// room anchored at the top-left corner.
pub fn default_start_cell() -> (i32, i32) {
    (START_ROOM_SIZE / 2, START_ROOM_SIZE / 2)
}

pub fn clamp_map_side(value: i32) -> i32 {
    value.clamp(MIN_MAP_SIDE, MAX_MAP_SIDE)
}

pub fn clamp_layer_count(value: usize) -> usize {
    value.clamp(1, MAX_LAYERS)
}
