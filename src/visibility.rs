use crate::constants::START_ROOM_SIZE;
use crate::map::MapDefinition;
use crate::state::GameState;
use crate::types::{Vec2, DIRECTIONS};

/// Fog-of-war pass: marks cells seen from the player's position, never
/// unmarks. Baseline is the starting room (start cell only in free-form
/// mazes) plus the player's cell; four cardinal rays extend while cells stay
/// active and the crossed wall lets the ray through.
pub fn recompute(state: &mut GameState, map: &MapDefinition) {
    mark_start_room(state, map);

    let layer_idx = state.player.layer;
    let origin = state.player.pos();
    mark(state, map, layer_idx, origin);

    for dir in DIRECTIONS {
        let mut cursor = origin;
        loop {
            let wall = state.layers[layer_idx].wall_between(cursor, dir);
            if wall.blocks_ray() {
                break;
            }
            let next = cursor.offset(dir);
            if !map.is_active(layer_idx, next) {
                break;
            }
            mark(state, map, layer_idx, next);
            cursor = next;
        }
    }
}

fn mark_start_room(state: &mut GameState, map: &MapDefinition) {
    let layer = map.start.layer;
    if map.free_form {
        mark(state, map, layer, Vec2::new(map.start.x, map.start.y));
        return;
    }
    for y in 0..START_ROOM_SIZE {
        for x in 0..START_ROOM_SIZE {
            mark(state, map, layer, Vec2::new(x, y));
        }
    }
}

fn mark(state: &mut GameState, map: &MapDefinition, layer: usize, pos: Vec2) {
    if !map.is_active(layer, pos) {
        return;
    }
    state.layers[layer].seen[pos.y as usize][pos.x as usize] = true;
}
