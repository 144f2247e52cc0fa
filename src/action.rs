use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown action code: {0}")]
pub struct ActionCodeError(pub u8);

/// A single input the player character can be asked to perform.
///
/// The discriminants are the integer codes used in persisted generations, so
/// they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Action {
    MoveRight = 1,
    MoveLeft = 2,
    StopMovement = 3,
    Jump = 4,
    Shoot = 5,
    Charge = 6,
    Dash = 7,
    ChangeWeapon = 8,
    Start = 9,
}

impl Action {
    /// Every action, in code order.
    pub const ALL: [Action; 9] = [
        Action::MoveRight,
        Action::MoveLeft,
        Action::StopMovement,
        Action::Jump,
        Action::Shoot,
        Action::Charge,
        Action::Dash,
        Action::ChangeWeapon,
        Action::Start,
    ];

    /// Highest code drawn by `random_movement`. Dash, weapon change and start
    /// only ever enter a chromosome through an imported generation.
    pub const MAX_MOVEMENT_CODE: u8 = Action::Charge as u8;

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Draws uniformly from the movement/combat subset (codes 1 through 6).
    ///
    /// # Arguments
    /// * `rng` - Random source, injected so callers can seed it
    ///
    /// # Returns
    /// * `Action` - One of `MoveRight`, `MoveLeft`, `StopMovement`, `Jump`, `Shoot`, `Charge`
    pub fn random_movement(rng: &mut impl Rng) -> Self {
        let code = rng.random_range(Action::MoveRight.code()..=Action::MAX_MOVEMENT_CODE);
        Action::ALL[usize::from(code - 1)]
    }

    pub fn is_movement(self) -> bool {
        self.code() <= Action::MAX_MOVEMENT_CODE
    }
}

impl From<Action> for u8 {
    fn from(action: Action) -> Self {
        action.code()
    }
}

impl TryFrom<u8> for Action {
    type Error = ActionCodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1..=9 => Ok(Action::ALL[usize::from(code - 1)]),
            _ => Err(ActionCodeError(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_codes_match_discriminants() {
        for (i, action) in Action::ALL.iter().enumerate() {
            assert_eq!(action.code() as usize, i + 1);
            assert_eq!(Action::try_from(action.code()), Ok(*action));
        }
    }

    #[test]
    fn test_unknown_codes_rejected() {
        assert_eq!(Action::try_from(0), Err(ActionCodeError(0)));
        assert_eq!(Action::try_from(10), Err(ActionCodeError(10)));
    }

    #[test]
    fn test_random_movement_stays_in_subset() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 6];
        for _ in 0..1_000 {
            let action = Action::random_movement(&mut rng);
            assert!(action.is_movement(), "drew {:?}", action);
            seen[usize::from(action.code() - 1)] = true;
        }
        assert!(seen.iter().all(|&s| s), "every movement action should be drawn");
    }

    #[test]
    fn test_serializes_as_integer_code() {
        let json = serde_json::to_string(&Action::Jump).unwrap();
        assert_eq!(json, "4");
        let parsed: Action = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, Action::Dash);
        assert!(serde_json::from_str::<Action>("12").is_err());
    }
}
