//! A* search over the quest grid.
//!
//! 4-directional, unit cost, Manhattan heuristic, bounded (no wrapping).
//! Scores live in hash maps so memory and time follow the cells explored
//! rather than the size of the map.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::map::Grid;
use super::types::Pos;

#[derive(Clone, Eq, PartialEq)]
struct Node {
    pos: Pos,
    g_cost: u32,
    f_cost: u32,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap; position breaks ties so searches replay exactly
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| self.g_cost.cmp(&other.g_cost))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn heuristic(a: Pos, b: Pos) -> u32 {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}

fn reconstruct(came_from: &HashMap<Pos, Pos>, end: Pos) -> Vec<Pos> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(prev) = came_from.get(&current) {
        path.push(*prev);
        current = *prev;
    }
    // drop the start cell
    path.pop();
    path.reverse();
    path
}

/// Shortest path from `start` to `goal` as the waypoints after `start`
/// (ending with `goal`). `Some(vec![])` when already there, `None` when the
/// goal is impassable or unreachable. The start cell itself may be blocked.
pub fn find_path(grid: &Grid, start: Pos, goal: Pos) -> Option<Vec<Pos>> {
    if !grid.passable(goal) || !grid.contains(start) {
        return None;
    }
    if start == goal {
        return Some(Vec::new());
    }

    let mut open = BinaryHeap::new();
    let mut g_scores: HashMap<Pos, u32> = HashMap::new();
    let mut came_from: HashMap<Pos, Pos> = HashMap::new();
    let mut closed: HashSet<Pos> = HashSet::new();

    g_scores.insert(start, 0);
    open.push(Node {
        pos: start,
        g_cost: 0,
        f_cost: heuristic(start, goal),
    });

    while let Some(current) = open.pop() {
        if current.pos == goal {
            return Some(reconstruct(&came_from, goal));
        }
        if !closed.insert(current.pos) {
            continue;
        }
        for next in grid.neighbours(current.pos) {
            if !grid.passable(next) || closed.contains(&next) {
                continue;
            }
            let new_g = current.g_cost + 1;
            if new_g < g_scores.get(&next).copied().unwrap_or(u32::MAX) {
                g_scores.insert(next, new_g);
                came_from.insert(next, current.pos);
                open.push(Node {
                    pos: next,
                    g_cost: new_g,
                    f_cost: new_g + heuristic(next, goal),
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_connected(start: Pos, path: &[Pos]) -> bool {
        let mut prev = start;
        for step in path {
            if heuristic(prev, *step) != 1 {
                return false;
            }
            prev = *step;
        }
        true
    }

    #[test]
    fn straight_line_on_open_grid() {
        let grid = Grid::new(10, 10);
        let path = find_path(&grid, Pos::new(1, 1), Pos::new(4, 1)).unwrap();
        assert_eq!(path, vec![Pos::new(2, 1), Pos::new(3, 1), Pos::new(4, 1)]);
    }

    #[test]
    fn already_at_goal() {
        let grid = Grid::new(3, 3);
        assert_eq!(find_path(&grid, Pos::new(1, 1), Pos::new(1, 1)), Some(vec![]));
    }

    #[test]
    fn routes_around_a_wall() {
        let mut grid = Grid::new(7, 7);
        for y in 0..6 {
            grid.block(Pos::new(3, y));
        }
        let start = Pos::new(0, 0);
        let goal = Pos::new(6, 0);
        let path = find_path(&grid, start, goal).unwrap();
        assert!(is_connected(start, &path));
        assert_eq!(*path.last().unwrap(), goal);
        assert!(path.iter().all(|p| grid.passable(*p)));
        // down to row 6, across, and back up
        assert_eq!(path.len(), 6 + 6 + 6);
    }

    #[test]
    fn sealed_goal_is_unreachable() {
        let mut grid = Grid::new(5, 5);
        for p in [Pos::new(1, 2), Pos::new(3, 2), Pos::new(2, 1), Pos::new(2, 3)] {
            grid.block(p);
        }
        assert_eq!(find_path(&grid, Pos::new(0, 0), Pos::new(2, 2)), None);
        grid.block(Pos::new(4, 4));
        assert_eq!(find_path(&grid, Pos::new(0, 0), Pos::new(4, 4)), None);
    }

    #[test]
    fn large_open_map_is_fast_enough() {
        let grid = Grid::new(500, 500);
        let path = find_path(&grid, Pos::new(0, 0), Pos::new(499, 499)).unwrap();
        assert_eq!(path.len(), 998);
    }
}
