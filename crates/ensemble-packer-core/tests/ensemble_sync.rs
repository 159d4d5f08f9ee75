use std::collections::HashSet;

use ensemble_packer_core::prelude::*;
use rand::{Rng, SeedableRng};

fn disjoint(rects: &[Rect]) -> bool {
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if rects[i].intersects(&rects[j]) {
                return false;
            }
        }
    }
    true
}

fn as_set(v: &[Rect]) -> HashSet<Rect> {
    v.iter().copied().collect()
}

#[test]
fn worked_example_single_position_engines_agree_on_origin() {
    let cfg = PackerConfig::builder().with_bin(100, 100).build();
    let ens = EnsemblePacker::from_config(&cfg).unwrap();
    for member in ens.roster() {
        let got = member.select_best_position(10, 10).unwrap();
        if member.name().starts_with("maxrects") {
            assert_eq!(got, vec![Rect::new(0, 0, 10, 10)], "{}", member.name());
        }
    }
    let pooled = as_set(&ens.get_candidates(10, 10).unwrap());
    let expected: HashSet<Rect> = [
        Rect::new(0, 0, 10, 10),
        Rect::new(0, 90, 10, 10),
        Rect::new(90, 0, 10, 10),
        Rect::new(90, 90, 10, 10),
    ]
    .into_iter()
    .collect();
    assert_eq!(pooled, expected);
}

#[test]
fn place_item_reaches_every_member_once() {
    let cfg = PackerConfig::builder()
        .with_bin(64, 64)
        .engine(EngineSpec::CornerPointsSl)
        .build();
    let mut ens = EnsemblePacker::from_config(&cfg).unwrap();
    let picks = [(16, 16), (8, 30), (40, 4)];
    for (w, h) in picks {
        let c = ens.get_candidates(w, h).unwrap();
        let r = c[c.len() - 1];
        ens.place_item(&r);
        for member in ens.roster() {
            let placed = member.rectangles();
            assert_eq!(placed.len(), ens.rectangles().len(), "{}", member.name());
            assert_eq!(placed.iter().filter(|p| **p == r).count(), 1);
        }
    }
    assert_eq!(ens.len(), 8);
    assert_eq!(ens.stats().num_rects, 3);
}

#[test]
fn repeated_queries_return_the_same_set() {
    let cfg = PackerConfig::builder().with_bin(80, 50).build();
    let mut ens = EnsemblePacker::from_config(&cfg).unwrap();
    ens.place_item(&Rect::new(0, 0, 30, 20));
    ens.place_item(&Rect::new(30, 0, 12, 35));
    let a = ens.get_candidates(9, 13).unwrap();
    let b = ens.get_candidates(9, 13).unwrap();
    assert_eq!(as_set(&a), as_set(&b));
    assert_eq!(a.len(), as_set(&a).len());
}

#[test]
fn random_run_stays_disjoint_and_in_bounds() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let cfg = PackerConfig::builder()
        .with_bin(256, 192)
        .engine(EngineSpec::CornerPointsSl)
        .engine(EngineSpec::MaxRects {
            heuristic: MaxRectsHeuristic::ContactPoint,
        })
        .build();
    let mut ens = EnsemblePacker::from_config(&cfg).unwrap();
    let bin = Rect::new(0, 0, 256, 192);

    let mut misses = 0;
    for _ in 0..200 {
        let w = rng.gen_range(4..=48);
        let h = rng.gen_range(4..=48);
        let candidates = ens.get_candidates(w, h).unwrap();
        if candidates.is_empty() {
            misses += 1;
            continue;
        }
        let pick = candidates[rng.gen_range(0..candidates.len())];
        assert!(bin.contains(&pick));
        assert!((pick.w, pick.h) == (w, h) || (pick.w, pick.h) == (h, w));
        assert!(ens.rectangles().iter().all(|r| !r.intersects(&pick)));
        ens.place_item(&pick);
    }
    assert!(misses > 0, "bin never filled up");
    assert!(disjoint(ens.rectangles()));
    let counts: HashSet<usize> = ens.roster().map(|m| m.rectangles().len()).collect();
    assert_eq!(counts.len(), 1);
}

#[test]
fn flat_index_addresses_the_undeduplicated_list() {
    let cfg = PackerConfig::builder().with_bin(100, 100).build();
    let ens = EnsemblePacker::from_config(&cfg).unwrap();
    // five maxrects members, one skyline, four corners per orientation
    let mut flat = Vec::new();
    let mut i = 0;
    while let Ok(r) = ens.get_candidate_at(10, 10, i) {
        flat.push(r);
        i += 1;
    }
    assert_eq!(flat.len(), 14);
    assert_eq!(as_set(&flat), as_set(&ens.get_candidates(10, 10).unwrap()));
    assert_eq!(flat[6..10], flat[10..14]);
    assert!(matches!(
        ens.get_candidate_at(10, 10, 14),
        Err(PackError::CandidateIndexOutOfRange { index: 14, len: 14 })
    ));
}

#[test]
fn unplaceable_item_is_an_empty_list_not_an_error() {
    let cfg = PackerConfig::builder().with_bin(30, 30).build();
    let ens = EnsemblePacker::from_config(&cfg).unwrap();
    assert!(ens.get_candidates(31, 2).unwrap().is_empty());
    assert!(matches!(
        ens.get_candidates(0, 2),
        Err(PackError::InvalidDimension { .. })
    ));
}

#[test]
fn layout_mirrors_the_canonical_member() {
    let cfg = PackerConfig::builder().with_bin(40, 40).build();
    let mut ens = EnsemblePacker::from_config(&cfg).unwrap();
    ens.place_item(&Rect::new(0, 0, 20, 20));
    ens.place_item(&Rect::new(20, 20, 20, 20));
    let layout = ens.layout();
    assert_eq!(layout.rects, ens.rectangles());
    assert_eq!(layout.stats.used_area, 800);
    assert!((layout.stats.occupancy - 0.5).abs() < 1e-12);
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_query_matches_sequential() {
    let cfg = PackerConfig::builder().with_bin(120, 120).build();
    let mut seq = EnsemblePacker::from_config(&cfg).unwrap();
    let mut par = EnsemblePacker::from_config(&cfg).unwrap().with_parallel(true);
    for r in [Rect::new(0, 0, 50, 30), Rect::new(50, 0, 20, 60)] {
        seq.place_item(&r);
        par.place_item(&r);
    }
    assert_eq!(
        seq.get_candidates(11, 7).unwrap(),
        par.get_candidates(11, 7).unwrap()
    );
    // flat pooled order is kept member by member
    let mut i = 0;
    while let Ok(r) = seq.get_candidate_at(11, 7, i) {
        assert_eq!(par.get_candidate_at(11, 7, i).unwrap(), r);
        i += 1;
    }
    assert!(par.get_candidate_at(11, 7, i).is_err());
    assert!(matches!(
        par.get_candidates(0, 7),
        Err(PackError::InvalidDimension { width: 0, height: 7 })
    ));
}
