use std::collections::{HashMap, HashSet, VecDeque};

use crate::map::MapDefinition;
use crate::state::LayerState;
use crate::types::{Direction, TrailPoint, Vec2, DIRECTIONS};

/// One tick of ghost movement on the player's layer. `pre` and `post` are
/// the player's positions before and after their own move this step.
///
/// Targeting follows visibility transitions: a ghost that sees the player's
/// new cell chases it; one that just lost sight heads for the last place it
/// saw the player; any other ghost stands still this tick.
pub fn run(layer: &mut LayerState, map: &MapDefinition, layer_idx: usize, pre: Vec2, post: Vec2, step: i32) {
    let mut intents: Vec<(usize, Vec2)> = Vec::new();
    for (idx, ghost) in layer.ghosts.iter().enumerate() {
        let saw_before = can_see(layer, map, layer_idx, ghost.pos(), pre);
        let sees_after = can_see(layer, map, layer_idx, ghost.pos(), post);
        let target = if sees_after {
            Some(post)
        } else if saw_before {
            Some(pre)
        } else {
            None
        };
        let Some(target) = target else {
            continue;
        };
        if let Some(next) = first_path_step(layer, map, layer_idx, ghost.pos(), target) {
            intents.push((idx, next));
        }
    }

    resolve_conflicts(layer, intents, step);
}

/// Straight-line sight along a shared row or column; every crossed wall must
/// be empty, glass, or an open letter door, and every cell active.
pub fn can_see(layer: &LayerState, map: &MapDefinition, layer_idx: usize, from: Vec2, to: Vec2) -> bool {
    if from == to {
        return true;
    }
    let dir = if from.x == to.x {
        if to.y > from.y {
            Direction::Down
        } else {
            Direction::Up
        }
    } else if from.y == to.y {
        if to.x > from.x {
            Direction::Right
        } else {
            Direction::Left
        }
    } else {
        return false;
    };

    let mut cursor = from;
    while cursor != to {
        if layer.wall_between(cursor, dir).blocks_ghost_sight() {
            return false;
        }
        let next = cursor.offset(dir);
        if !map.is_active(layer_idx, next) {
            return false;
        }
        cursor = next;
    }
    true
}

/// Second cell of an unweighted shortest path from `from` to `to`, if any
/// path of length >= 2 exists. Ghosts pass only empty walls and open letter
/// doors; keys and one-way directions mean nothing to them.
fn first_path_step(
    layer: &LayerState,
    map: &MapDefinition,
    layer_idx: usize,
    from: Vec2,
    to: Vec2,
) -> Option<Vec2> {
    if from == to {
        return None;
    }
    let mut prev: HashMap<Vec2, Vec2> = HashMap::new();
    let mut queue = VecDeque::new();
    queue.push_back(from);
    prev.insert(from, from);

    while let Some(cell) = queue.pop_front() {
        if cell == to {
            break;
        }
        for dir in DIRECTIONS {
            if layer.wall_between(cell, dir).blocks_ghost() {
                continue;
            }
            let next = cell.offset(dir);
            if !map.is_active(layer_idx, next) || prev.contains_key(&next) {
                continue;
            }
            prev.insert(next, cell);
            queue.push_back(next);
        }
    }

    if !prev.contains_key(&to) {
        return None;
    }
    let mut cursor = to;
    while prev[&cursor] != from {
        cursor = prev[&cursor];
    }
    Some(cursor)
}

/// Round-based resolution: each round snapshots the occupied set, grants
/// each distinct free target to the first intent that claims it, and retries
/// the rest. Bounded by ghost count + 1 rounds; a fully blocked ghost simply
/// stays put this tick.
fn resolve_conflicts(layer: &mut LayerState, intents: Vec<(usize, Vec2)>, step: i32) {
    let mut pending = intents;
    let rounds = layer.ghosts.len() + 1;
    for _ in 0..rounds {
        if pending.is_empty() {
            break;
        }
        let occupied: HashSet<Vec2> = layer.ghosts.iter().map(|g| g.pos()).collect();
        let mut granted: HashSet<Vec2> = HashSet::new();
        let mut retry = Vec::new();
        let mut moved = false;

        for (idx, target) in pending {
            if occupied.contains(&target) || !granted.insert(target) {
                retry.push((idx, target));
                continue;
            }
            let ghost = &mut layer.ghosts[idx];
            ghost.trail.push(TrailPoint {
                x: ghost.x,
                y: ghost.y,
                step,
            });
            ghost.x = target.x;
            ghost.y = target.y;
            moved = true;
        }

        pending = retry;
        if !moved {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{LayerDefinition, MapDefinition, StartPos};
    use crate::state::GameState;
    use crate::types::{GameMode, Wall};

    fn open_map(width: i32, height: i32) -> MapDefinition {
        MapDefinition {
            width,
            height,
            game_mode: GameMode::Exploration,
            initial_health: 3,
            initial_stamina: 20,
            free_form: false,
            multi_layer: false,
            layers: vec![LayerDefinition::open(width, height)],
            stairs: Vec::new(),
            start: StartPos {
                x: 1,
                y: 1,
                layer: 0,
            },
        }
    }

    fn state_with_ghosts(map: &mut MapDefinition, ghosts: &[(i32, i32)]) -> GameState {
        map.layers[0].ghosts = ghosts.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
        GameState::initial(map)
    }

    fn ghost_positions(state: &GameState) -> Vec<Vec2> {
        state.layers[0].ghosts.iter().map(|g| g.pos()).collect()
    }

    #[test]
    fn visible_ghost_advances_one_cell_along_the_path() {
        let mut map = open_map(10, 10);
        let mut state = state_with_ghosts(&mut map, &[(5, 5)]);
        // Player moved within the ghost's column: (5, 3) -> (5, 2).
        run(&mut state.layers[0], &map, 0, Vec2::new(5, 3), Vec2::new(5, 2), 1);
        assert_eq!(ghost_positions(&state), vec![Vec2::new(5, 4)]);
        assert_eq!(state.layers[0].ghosts[0].trail.len(), 1);
        assert_eq!(state.layers[0].ghosts[0].trail[0].x, 5);
        assert_eq!(state.layers[0].ghosts[0].trail[0].y, 5);
    }

    #[test]
    fn ghost_without_sight_does_not_move() {
        let mut map = open_map(10, 10);
        // Solid wall between the ghost's column and the player.
        for row in &mut map.layers[0].v_walls {
            row[4] = Wall::Solid;
        }
        let mut state = state_with_ghosts(&mut map, &[(5, 5)]);
        run(&mut state.layers[0], &map, 0, Vec2::new(2, 5), Vec2::new(3, 5), 1);
        assert_eq!(ghost_positions(&state), vec![Vec2::new(5, 5)]);
        assert!(state.layers[0].ghosts[0].trail.is_empty());
    }

    #[test]
    fn lost_sight_targets_the_last_seen_position() {
        let mut map = open_map(10, 10);
        // Wall between rows 4 and 5 except at column 2, so the player is
        // visible along column 2 and hidden after stepping off it.
        map.layers[0].h_walls[5] = vec![Wall::Solid; 10];
        map.layers[0].h_walls[5][2] = Wall::Empty;
        let mut state = state_with_ghosts(&mut map, &[(2, 7)]);
        // Player moved (2, 3) -> (3, 3): sight along column 2 just broke.
        run(&mut state.layers[0], &map, 0, Vec2::new(2, 3), Vec2::new(3, 3), 1);
        // The ghost heads toward (2, 3), so it steps up its column.
        assert_eq!(ghost_positions(&state), vec![Vec2::new(2, 6)]);
    }

    #[test]
    fn glass_passes_ghost_sight_but_blocks_ghost_movement() {
        let mut map = open_map(10, 10);
        for row in &mut map.layers[0].v_walls {
            row[4] = Wall::Glass;
        }
        let mut state = state_with_ghosts(&mut map, &[(5, 5)]);
        // Player fully visible through the glass, but no path crosses the
        // glass column anywhere.
        run(&mut state.layers[0], &map, 0, Vec2::new(3, 5), Vec2::new(3, 5), 1);
        assert_eq!(ghost_positions(&state), vec![Vec2::new(5, 5)]);
    }

    #[test]
    fn open_letter_door_passes_sight_and_movement() {
        let mut map = open_map(10, 10);
        for row in &mut map.layers[0].v_walls {
            row[4] = Wall::LetterDoor {
                letter: 'a',
                is_open: true,
            };
        }
        let mut state = state_with_ghosts(&mut map, &[(5, 5)]);
        run(&mut state.layers[0], &map, 0, Vec2::new(3, 5), Vec2::new(3, 5), 1);
        assert_eq!(ghost_positions(&state), vec![Vec2::new(4, 5)]);
    }

    #[test]
    fn conflict_resolution_keeps_ghosts_mutually_exclusive() {
        let mut map = open_map(9, 9);
        // Two ghosts flanking the player's column converge on it.
        let mut state = state_with_ghosts(&mut map, &[(3, 4), (5, 4)]);
        run(&mut state.layers[0], &map, 0, Vec2::new(4, 4), Vec2::new(4, 4), 1);
        let positions = ghost_positions(&state);
        assert_eq!(positions.len(), 2);
        assert_ne!(positions[0], positions[1]);
        // First intent in iteration order won the contested cell.
        assert_eq!(positions[0], Vec2::new(4, 4));
        assert_eq!(positions[1], Vec2::new(5, 4));
    }

    #[test]
    fn blocked_follower_moves_in_a_later_round() {
        let mut map = open_map(9, 9);
        // Single-file corridor along row 4.
        map.layers[0].h_walls[4] = vec![Wall::Solid; 9];
        map.layers[0].h_walls[5] = vec![Wall::Solid; 9];
        let mut state = state_with_ghosts(&mut map, &[(5, 4), (6, 4)]);
        run(&mut state.layers[0], &map, 0, Vec2::new(2, 4), Vec2::new(1, 4), 1);
        // Lead ghost vacates (5, 4); the follower claims it next round.
        assert_eq!(
            ghost_positions(&state),
            vec![Vec2::new(4, 4), Vec2::new(5, 4)]
        );
    }

    #[test]
    fn sight_does_not_bend_around_corners() {
        let map = open_map(10, 10);
        let state = GameState::initial(&map);
        assert!(can_see(
            &state.layers[0],
            &map,
            0,
            Vec2::new(2, 2),
            Vec2::new(2, 8)
        ));
        assert!(!can_see(
            &state.layers[0],
            &map,
            0,
            Vec2::new(2, 2),
            Vec2::new(3, 8)
        ));
    }
}
