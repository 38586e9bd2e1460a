use huntrack::{
    huntech::{Huntech, HuntechError, NenAbility, NenType},
    AugmentedSearchTree, Element, LazyUnionFind, Order,
};

struct Member {
    alive: bool,
}

impl Element for Member {
    type Value = i64;

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn mark_dead(&mut self) {
        self.alive = false;
    }
}

fn ranks() -> huntrack::Result<()> {
    let mut map = AugmentedSearchTree::new();
    for key in [5, 3, 8, 1, 4, 7, 9] {
        map.insert(key, key * 100)?;
        map.assert_invariants();
    }

    println!("{:?}", map.iter().map(|(k, _)| *k).collect::<Vec<_>>());
    println!("4th smallest: {:?}", map.rank_select(4)?);

    map.remove(&3)?;
    map.assert_invariants();
    println!("4th smallest after removing 3: {:?}", map.rank_select(4)?);

    Ok(())
}

fn sets() -> huntrack::Result<()> {
    let mut sets = LazyUnionFind::new();
    let a = sets.make_set(Member { alive: true })?;
    let b = sets.make_set(Member { alive: true })?;

    sets.contribute(b, 5)?;
    sets.combine(a, b, Order::Merge)?;
    println!(
        "a = {}, b = {}",
        sets.query_additive(a)?,
        sets.query_additive(b)?
    );

    Ok(())
}

fn ledger() -> Result<(), HuntechError> {
    let mut huntech = Huntech::new();
    huntech.add_squad(1)?;
    huntech.add_squad(2)?;

    huntech.add_hunter(10, 1, NenAbility::new(NenType::Enhancement, 4), 12, 0)?;
    huntech.add_hunter(11, 1, NenAbility::new(NenType::Emission, 2), 1, 3)?;
    huntech.add_hunter(20, 2, NenAbility::new(NenType::Conjuration, 9), 8, 0)?;

    let outcome = huntech.squad_duel(1, 2)?;
    println!("duel: {outcome:?} ({})", outcome.code());
    println!("weakest squad: {}", huntech.get_ith_collective_aura_squad(1)?);

    huntech.force_join(1, 2)?;
    println!(
        "hunter 20 after joining squad 1: {:?}",
        huntech.get_partial_nen_ability(20)?
    );
    println!("hunter 11 fights: {}", huntech.get_hunter_fights_number(11)?);

    Ok(())
}

fn main() {
    if let Err(err) = ranks() {
        eprintln!("tree: {err}");
    }

    if let Err(err) = sets() {
        eprintln!("union-find: {err}");
    }

    if let Err(err) = ledger() {
        eprintln!("huntech: {err}");
    }
}
