//! A deterministic side-scrolling course that stands in for the emulator.
//!
//! Positions are integers along a single axis. Pits kill the player when it
//! is on the ground inside them; enemies deal contact damage when the player
//! walks into them unless they were shot first.

use crate::action::Action;
use crate::driver::{ActionExecutor, ProgressSource, Status};
use serde::{Deserialize, Serialize};

/// Layout and physics of the simulated course, read from the `[course]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseConfig {
    pub start_position: u32,
    /// Distance covered per tick while moving
    pub walk_speed: u32,
    pub dash_distance: u32,
    /// Ticks a jump keeps the player off the ground
    pub jump_ticks: u32,
    pub start_health: u32,
    pub contact_damage: u32,
    pub shot_range: u32,
    pub charged_shot_range: u32,
    /// Half-open `[start, end)` spans
    pub pits: Vec<(u32, u32)>,
    pub enemies: Vec<u32>,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            start_position: 16,
            walk_speed: 2,
            dash_distance: 40,
            jump_ticks: 48,
            start_health: 16,
            contact_damage: 2,
            shot_range: 120,
            charged_shot_range: 240,
            pits: Vec::new(),
            enemies: Vec::new(),
        }
    }
}

impl CourseConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.walk_speed == 0 {
            return Err("walk_speed must be positive".to_string());
        }
        if self.start_health == 0 {
            return Err("start_health must be positive".to_string());
        }
        if let Some((start, end)) = self.pits.iter().find(|(start, end)| start >= end) {
            return Err(format!("pit [{}, {}) is empty", start, end));
        }
        if self.in_pit(self.start_position) {
            return Err(format!(
                "start_position {} lies inside a pit",
                self.start_position
            ));
        }
        Ok(())
    }

    fn in_pit(&self, position: u32) -> bool {
        self.pits
            .iter()
            .any(|&(start, end)| (start..end).contains(&position))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct SimulatedCourse {
    config: CourseConfig,
    position: u32,
    health: u32,
    moving: Option<Direction>,
    facing: Direction,
    airborne_ticks: u32,
    charged: bool,
    enemies_alive: Vec<bool>,
}

impl SimulatedCourse {
    pub fn new(config: CourseConfig) -> Self {
        let mut course = Self {
            position: config.start_position,
            health: config.start_health,
            moving: None,
            facing: Direction::Right,
            airborne_ticks: 0,
            charged: false,
            enemies_alive: vec![true; config.enemies.len()],
            config,
        };
        course.reset();
        course
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne_ticks > 0
    }

    fn shift(&mut self, direction: Direction, distance: u32) {
        self.position = match direction {
            Direction::Right => self.position.saturating_add(distance),
            Direction::Left => self.position.saturating_sub(distance),
        };
    }

    fn shoot(&mut self) {
        let range = if self.charged {
            self.config.charged_shot_range
        } else {
            self.config.shot_range
        };
        self.charged = false;

        let position = self.position;
        let facing = self.facing;
        let target = self
            .config
            .enemies
            .iter()
            .enumerate()
            .filter(|&(i, _)| self.enemies_alive[i])
            .filter(|&(_, &enemy)| match facing {
                Direction::Right => enemy > position && enemy - position <= range,
                Direction::Left => enemy < position && position - enemy <= range,
            })
            .min_by_key(|&(_, &enemy)| enemy.abs_diff(position))
            .map(|(i, _)| i);
        if let Some(i) = target {
            self.enemies_alive[i] = false;
        }
    }
}

impl ProgressSource for SimulatedCourse {
    fn sample(&mut self) -> Status {
        if let Some(direction) = self.moving {
            self.shift(direction, self.config.walk_speed);
        }
        if self.airborne_ticks > 0 {
            self.airborne_ticks -= 1;
        }

        if self.airborne_ticks == 0 && self.config.in_pit(self.position) {
            self.health = 0;
        }
        for (&enemy, alive) in self.config.enemies.iter().zip(self.enemies_alive.iter_mut()) {
            if *alive && self.position >= enemy {
                *alive = false;
                self.health = self.health.saturating_sub(self.config.contact_damage);
            }
        }

        Status {
            position: self.position,
            health: self.health,
        }
    }
}

impl ActionExecutor for SimulatedCourse {
    fn perform(&mut self, action: Action) {
        match action {
            Action::MoveRight => {
                self.moving = Some(Direction::Right);
                self.facing = Direction::Right;
            }
            Action::MoveLeft => {
                self.moving = Some(Direction::Left);
                self.facing = Direction::Left;
            }
            Action::StopMovement => self.moving = None,
            Action::Jump => {
                if self.airborne_ticks == 0 {
                    self.airborne_ticks = self.config.jump_ticks;
                }
            }
            Action::Shoot => self.shoot(),
            Action::Charge => self.charged = true,
            Action::Dash => self.shift(self.facing, self.config.dash_distance),
            Action::ChangeWeapon | Action::Start => {}
        }
    }

    fn reset(&mut self) {
        self.position = self.config.start_position;
        self.health = self.config.start_health;
        self.moving = None;
        self.facing = Direction::Right;
        self.airborne_ticks = 0;
        self.charged = false;
        self.enemies_alive.iter_mut().for_each(|alive| *alive = true);
    }
}
