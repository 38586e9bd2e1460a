//! Squad and hunter bookkeeping built on the crate's containers.
//!
//! Squads are kept twice: by id, and ranked by `(aura, id)` so the `i`-th weakest squad can be
//! selected. Each squad's hunters form one set of a [`LazyUnionFind`], in the order they joined.
//! A hunter's fights counter and *partial* nen ability (its own ability plus that of every hunter
//! who joined its squad before it) are additive values of that set, so squad-wide updates and
//! forced joins never visit individual hunters.

use core::ops::{Add, Neg, Sub};

use crate::{id_table::IdTable, AugmentedSearchTree, Element, Error, LazyUnionFind, Order, Result};

/// Failures reported by [`Huntech`] operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HuntechError {
    /// An argument was out of its domain. Nothing was looked up.
    #[error("invalid input")]
    InvalidInput,
    /// The operation does not apply to the current state.
    #[error("operation failed")]
    Failure,
    #[error("allocation failed")]
    AllocationFailure,
}

impl From<Error> for HuntechError {
    fn from(err: Error) -> Self {
        match err {
            Error::AllocationFailure => HuntechError::AllocationFailure,
            _ => HuntechError::Failure,
        }
    }
}

/// The six categories of nen.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NenType {
    Enhancement = 0,
    Transmutation = 1,
    Emission = 2,
    Conjuration = 3,
    Manipulation = 4,
    Specialization = 5,
}

/// Strength in each nen category. Abilities compose by per-category addition.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NenAbility {
    strengths: [i64; 6],
}

impl NenAbility {
    /// An ability with `strength` in `kind` and nothing elsewhere.
    pub fn new(kind: NenType, strength: i64) -> Self {
        let mut ability = Self::default();
        ability.strengths[kind as usize] = strength;
        ability
    }

    pub fn strength(&self, kind: NenType) -> i64 {
        self.strengths[kind as usize]
    }

    /// Returns `true` if no category has negative strength.
    pub fn is_valid(&self) -> bool {
        self.strengths.iter().all(|&s| s >= 0)
    }

    /// The combined strength across every category.
    pub fn effective(&self) -> i64 {
        self.strengths.iter().fold(0, |total, &s| total.saturating_add(s))
    }

    fn zip_with(self, rhs: Self, f: impl Fn(i64, i64) -> i64) -> Self {
        let mut strengths = self.strengths;
        for (lhs, rhs) in strengths.iter_mut().zip(rhs.strengths) {
            *lhs = f(*lhs, rhs);
        }
        NenAbility { strengths }
    }
}

impl Add for NenAbility {
    type Output = NenAbility;

    fn add(self, rhs: Self) -> Self::Output {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for NenAbility {
    type Output = NenAbility;

    fn sub(self, rhs: Self) -> Self::Output {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Neg for NenAbility {
    type Output = NenAbility;

    fn neg(self) -> Self::Output {
        NenAbility::default() - self
    }
}

// The additive value tracked per hunter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct HunterRecord {
    fights: i64,
    ability: NenAbility,
}

impl Add for HunterRecord {
    type Output = HunterRecord;

    fn add(self, rhs: Self) -> Self::Output {
        HunterRecord {
            fights: self.fights + rhs.fights,
            ability: self.ability + rhs.ability,
        }
    }
}

impl Sub for HunterRecord {
    type Output = HunterRecord;

    fn sub(self, rhs: Self) -> Self::Output {
        HunterRecord {
            fights: self.fights - rhs.fights,
            ability: self.ability - rhs.ability,
        }
    }
}

impl Neg for HunterRecord {
    type Output = HunterRecord;

    fn neg(self) -> Self::Output {
        HunterRecord {
            fights: -self.fights,
            ability: -self.ability,
        }
    }
}

struct Hunter {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    id: i32,
    alive: bool,
}

impl Element for Hunter {
    type Value = HunterRecord;

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn mark_dead(&mut self) {
        #[cfg(feature = "tracing")]
        tracing::trace!(hunter_id = self.id, "squad head marked dead");

        self.alive = false;
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct Squad {
    // Any member of the squad's set; `None` until the first hunter joins.
    head: Option<usize>,
    aura: i64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct AuraKey {
    aura: i64,
    id: i32,
}

/// The result of [`Huntech::squad_duel`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DuelOutcome {
    Draw,
    FirstByAura,
    FirstByAbility,
    SecondByAura,
    SecondByAbility,
}

impl DuelOutcome {
    /// The numeric outcome code: 0 for a draw, 1 and 2 for a win of the first squad, 3 and 4 for a
    /// win of the second.
    pub fn code(self) -> i32 {
        match self {
            DuelOutcome::Draw => 0,
            DuelOutcome::FirstByAura => 1,
            DuelOutcome::FirstByAbility => 2,
            DuelOutcome::SecondByAura => 3,
            DuelOutcome::SecondByAbility => 4,
        }
    }
}

const WIN_EXPERIENCE: i64 = 3;
const DRAW_EXPERIENCE: i64 = 1;

/// The squad and hunter ledger.
///
/// Every operation validates its arguments first and reports [`HuntechError::InvalidInput`]
/// without touching any state. An operation that fails later undoes whatever it had already
/// changed.
#[derive(Default)]
pub struct Huntech {
    hunters: IdTable<i32, usize>,
    members: LazyUnionFind<Hunter>,
    squads: AugmentedSearchTree<i32, Squad>,
    aura_ranking: AugmentedSearchTree<AuraKey, ()>,
}

impl Huntech {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty squad.
    pub fn add_squad(&mut self, squad_id: i32) -> Result<(), HuntechError> {
        if squad_id <= 0 {
            return Err(HuntechError::InvalidInput);
        }

        self.squads.insert(squad_id, Squad::default())?;

        if let Err(err) = self.aura_ranking.insert(AuraKey { aura: 0, id: squad_id }, ()) {
            #[cfg(feature = "tracing")]
            tracing::warn!(squad_id, %err, "rolling back squad insertion");

            self.squads.remove(&squad_id)?;
            return Err(err.into());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(squad_id, "added squad");

        Ok(())
    }

    /// Removes a squad. Its hunters stay registered but are dead from then on.
    pub fn remove_squad(&mut self, squad_id: i32) -> Result<(), HuntechError> {
        if squad_id <= 0 {
            return Err(HuntechError::InvalidInput);
        }

        let squad = *self.squads.search(&squad_id)?;

        self.aura_ranking.remove(&AuraKey {
            aura: squad.aura,
            id: squad_id,
        })?;

        if let Some(head) = squad.head {
            self.members.mark_dead(head)?;
        }

        self.squads.remove(&squad_id)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(squad_id, "removed squad");

        Ok(())
    }

    /// Adds a new hunter at the end of a squad.
    ///
    /// The hunter's partial ability is its own ability plus that of every hunter already in the
    /// squad. Fails if `hunter_id` was ever registered, even in a squad since removed.
    pub fn add_hunter(
        &mut self,
        hunter_id: i32,
        squad_id: i32,
        ability: NenAbility,
        aura: i64,
        fights_had: i64,
    ) -> Result<(), HuntechError> {
        if hunter_id <= 0 || squad_id <= 0 || !ability.is_valid() || aura < 0 || fights_had < 0 {
            return Err(HuntechError::InvalidInput);
        }

        if self.hunters.find(&hunter_id).is_some() {
            return Err(HuntechError::Failure);
        }

        let squad = *self.squads.search(&squad_id)?;
        let new_aura = squad.aura.checked_add(aura).ok_or(HuntechError::Failure)?;

        self.move_aura_key(squad_id, squad.aura, new_aura)?;

        let head = match self.enlist(hunter_id, squad.head, ability, fights_had) {
            Ok(head) => head,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(hunter_id, squad_id, %err, "rolling back hunter insertion");

                self.move_aura_key(squad_id, new_aura, squad.aura)?;
                return Err(err.into());
            }
        };

        let squad = self.squads.search_mut(&squad_id)?;
        squad.head = Some(head);
        squad.aura = new_aura;

        #[cfg(feature = "tracing")]
        tracing::debug!(hunter_id, squad_id, aura = new_aura, "added hunter");

        Ok(())
    }

    // Creates the hunter's set, registers its id and appends it to the squad headed by `head`.
    // Returns the squad's head afterwards.
    fn enlist(
        &mut self,
        hunter_id: i32,
        head: Option<usize>,
        ability: NenAbility,
        fights_had: i64,
    ) -> Result<usize> {
        let own = HunterRecord {
            fights: fights_had,
            ability,
        };
        let carry = HunterRecord {
            fights: 0,
            ability,
        };

        let idx = self.members.make_set_with(
            Hunter {
                id: hunter_id,
                alive: true,
            },
            own,
            carry,
        )?;

        // A slot that is never registered stays unreachable.
        self.hunters.insert(hunter_id, idx)?;

        let Some(head) = head else {
            return Ok(idx);
        };

        if let Err(err) = self.members.combine(head, idx, Order::Absorb) {
            self.hunters.remove(&hunter_id);
            return Err(err);
        }

        Ok(head)
    }

    /// Makes two squads fight.
    ///
    /// Every hunter of both squads has one more fight. The squad with the larger experience plus
    /// aura wins; a tie is broken by total squad ability. The winner gains 3 experience, and a
    /// draw gives each squad 1.
    pub fn squad_duel(&mut self, squad_id1: i32, squad_id2: i32) -> Result<DuelOutcome, HuntechError> {
        if squad_id1 <= 0 || squad_id2 <= 0 || squad_id1 == squad_id2 {
            return Err(HuntechError::InvalidInput);
        }

        let squad1 = *self.squads.search(&squad_id1)?;
        let squad2 = *self.squads.search(&squad_id2)?;

        let (Some(head1), Some(head2)) = (squad1.head, squad2.head) else {
            return Err(HuntechError::Failure);
        };

        let fight = HunterRecord {
            fights: 1,
            ..HunterRecord::default()
        };
        self.members.add_to_set(head1, fight)?;
        self.members.add_to_set(head2, fight)?;

        let root1 = self.members.find(head1)?;
        let root2 = self.members.find(head2)?;

        let aura1 = self.members.get_experience(root1)? + squad1.aura;
        let aura2 = self.members.get_experience(root2)? + squad2.aura;
        let ability1 = self.members.group_total(root1)?.ability.effective();
        let ability2 = self.members.group_total(root2)?.ability.effective();

        let outcome = if aura1 != aura2 {
            if aura1 > aura2 {
                DuelOutcome::FirstByAura
            } else {
                DuelOutcome::SecondByAura
            }
        } else if ability1 > ability2 {
            DuelOutcome::FirstByAbility
        } else if ability2 > ability1 {
            DuelOutcome::SecondByAbility
        } else {
            DuelOutcome::Draw
        };

        match outcome {
            DuelOutcome::FirstByAura | DuelOutcome::FirstByAbility => {
                self.members.add_experience(root1, WIN_EXPERIENCE)?
            }
            DuelOutcome::SecondByAura | DuelOutcome::SecondByAbility => {
                self.members.add_experience(root2, WIN_EXPERIENCE)?
            }
            DuelOutcome::Draw => {
                self.members.add_experience(root1, DRAW_EXPERIENCE)?;
                self.members.add_experience(root2, DRAW_EXPERIENCE)?;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(squad_id1, squad_id2, ?outcome, "duel");

        Ok(outcome)
    }

    /// Returns how many fights a hunter has had, including the ones it had before joining.
    pub fn get_hunter_fights_number(&mut self, hunter_id: i32) -> Result<i64, HuntechError> {
        let idx = self.hunter_index(hunter_id)?;
        Ok(self.members.query_additive(idx)?.fights)
    }

    pub fn get_squad_experience(&mut self, squad_id: i32) -> Result<i64, HuntechError> {
        if squad_id <= 0 {
            return Err(HuntechError::InvalidInput);
        }

        match self.squads.search(&squad_id)?.head {
            Some(head) => Ok(self.members.get_experience(head)?),
            None => Ok(0),
        }
    }

    /// Returns the id of the squad with the `i`-th smallest aura, counting from 1.
    ///
    /// Squads with equal aura are ordered by id.
    pub fn get_ith_collective_aura_squad(&self, i: i32) -> Result<i32, HuntechError> {
        let rank = usize::try_from(i).map_err(|_| HuntechError::Failure)?;
        let (key, ()) = self.aura_ranking.rank_select(rank)?;
        Ok(key.id)
    }

    /// Returns the ability of a living hunter plus that of every hunter who joined its squad
    /// before it.
    pub fn get_partial_nen_ability(&mut self, hunter_id: i32) -> Result<NenAbility, HuntechError> {
        let idx = self.hunter_index(hunter_id)?;

        if !self.members.is_alive(idx)? {
            return Err(HuntechError::Failure);
        }

        Ok(self.members.query_additive(idx)?.ability)
    }

    /// Moves every hunter of `forced_id` to the end of `forcing_id`, then removes `forced_id`.
    ///
    /// The forcing squad must have hunters. If the forced squad has hunters too, the forcing squad
    /// must be strictly stronger by experience plus aura plus total ability; it then takes over
    /// the forced squad's aura and experience.
    pub fn force_join(&mut self, forcing_id: i32, forced_id: i32) -> Result<(), HuntechError> {
        if forcing_id <= 0 || forced_id <= 0 || forcing_id == forced_id {
            return Err(HuntechError::InvalidInput);
        }

        let forcing = *self.squads.search(&forcing_id)?;
        let forced = *self.squads.search(&forced_id)?;

        let Some(head1) = forcing.head else {
            return Err(HuntechError::Failure);
        };

        if let Some(head2) = forced.head {
            if self.power(head1, forcing.aura)? <= self.power(head2, forced.aura)? {
                return Err(HuntechError::Failure);
            }

            let new_aura = forcing
                .aura
                .checked_add(forced.aura)
                .ok_or(HuntechError::Failure)?;
            self.move_aura_key(forcing_id, forcing.aura, new_aura)?;

            if let Err(err) = self.members.combine(head1, head2, Order::Absorb) {
                #[cfg(feature = "tracing")]
                tracing::warn!(forcing_id, forced_id, %err, "rolling back forced join");

                self.move_aura_key(forcing_id, new_aura, forcing.aura)?;
                return Err(err.into());
            }

            let head = self.members.find(head1)?;
            let squad = self.squads.search_mut(&forcing_id)?;
            squad.head = Some(head);
            squad.aura = new_aura;
        }

        self.aura_ranking.remove(&AuraKey {
            aura: forced.aura,
            id: forced_id,
        })?;
        self.squads.remove(&forced_id)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(forcing_id, forced_id, "forced join");

        Ok(())
    }

    fn hunter_index(&self, hunter_id: i32) -> Result<usize, HuntechError> {
        if hunter_id <= 0 {
            return Err(HuntechError::InvalidInput);
        }

        self.hunters
            .find(&hunter_id)
            .copied()
            .ok_or(HuntechError::Failure)
    }

    // Experience plus aura plus total ability of the squad whose set contains `head`.
    fn power(&mut self, head: usize, aura: i64) -> Result<i64> {
        let experience = self.members.get_experience(head)?;
        let ability = self.members.group_total(head)?.ability.effective();
        Ok(experience.saturating_add(aura).saturating_add(ability))
    }

    // Re-ranks a squad whose aura changes from `from` to `to`.
    fn move_aura_key(&mut self, id: i32, from: i64, to: i64) -> Result<()> {
        let old = AuraKey { aura: from, id };
        self.aura_ranking.remove(&old)?;

        if let Err(err) = self.aura_ranking.insert(AuraKey { aura: to, id }, ()) {
            self.aura_ranking.insert(old, ())?;
            return Err(err);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ability_arithmetic() {
        let a = NenAbility::new(NenType::Emission, 4) + NenAbility::new(NenType::Conjuration, 2);
        let b = NenAbility::new(NenType::Emission, 1);

        assert_eq!((a - b).strength(NenType::Emission), 3);
        assert_eq!((a - b).effective(), 5);
        assert_eq!((-a).strength(NenType::Conjuration), -2);
        assert!(a.is_valid());
        assert!(!(-a).is_valid());
        assert!(NenAbility::default().is_valid());
    }

    #[test]
    fn record_is_additive() {
        let record = HunterRecord {
            fights: 2,
            ability: NenAbility::new(NenType::Manipulation, 7),
        };

        assert_eq!(record + -record, HunterRecord::default());
        assert_eq!((record - record).fights, 0);
    }

    #[test]
    fn aura_keys_order_by_aura_then_id() {
        let mut keys = [
            AuraKey { aura: 5, id: 1 },
            AuraKey { aura: 2, id: 9 },
            AuraKey { aura: 5, id: 0 },
        ];
        keys.sort();

        assert_eq!(keys.map(|k| k.id), [9, 0, 1]);
    }

    #[test]
    fn outcome_codes() {
        let codes = [
            DuelOutcome::Draw,
            DuelOutcome::FirstByAura,
            DuelOutcome::FirstByAbility,
            DuelOutcome::SecondByAura,
            DuelOutcome::SecondByAbility,
        ]
        .map(DuelOutcome::code);

        assert_eq!(codes, [0, 1, 2, 3, 4]);
    }
}
