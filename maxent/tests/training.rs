#![allow(missing_docs)]

use serif_maxent::{
    Error, MaxEntEvent, MaxEntModel, Predicate, StopCriterion, Symbol, SymbolTable, TrainMode,
    TrainOptions,
};

struct Corpus {
    symbols: SymbolTable,
    yes: Symbol,
    no: Symbol,
}

impl Corpus {
    fn new() -> Self {
        let _ = serif_logger::try_setup();
        let mut symbols = SymbolTable::new();
        let yes = symbols.intern("YES");
        let no = symbols.intern("NO");
        Self { symbols, yes, no }
    }

    fn event(&mut self, outcome: Symbol, predicates: &[&str]) -> MaxEntEvent {
        let predicates = predicates
            .iter()
            .map(|text| Predicate::parse(text, &mut self.symbols))
            .collect();
        MaxEntEvent::with_predicates(outcome, predicates)
    }

    fn model(&self, options: TrainOptions) -> MaxEntModel {
        MaxEntModel::new(&[self.yes, self.no], options).unwrap()
    }

    /// `has_keyword` holds for 8 of 10 YES and 1 of 10 NO examples.
    fn keyword_model(&mut self, options: TrainOptions) -> MaxEntModel {
        let mut model = self.model(options);
        let (yes, no) = (self.yes, self.no);
        model.add_event(&self.event(yes, &["has_keyword"]), 8).unwrap();
        model.add_event(&self.event(yes, &[]), 2).unwrap();
        model.add_event(&self.event(no, &["has_keyword"]), 1).unwrap();
        model.add_event(&self.event(no, &[]), 9).unwrap();
        model
    }

    fn overlapping_model(&mut self, options: TrainOptions) -> MaxEntModel {
        let mut model = self.model(options);
        let (yes, no) = (self.yes, self.no);
        model.add_event(&self.event(yes, &["kw", "a"]), 6).unwrap();
        model.add_event(&self.event(yes, &["kw"]), 2).unwrap();
        model.add_event(&self.event(yes, &["b"]), 1).unwrap();
        model.add_event(&self.event(no, &["b"]), 6).unwrap();
        model.add_event(&self.event(no, &["kw", "b"]), 1).unwrap();
        model.add_event(&self.event(no, &["a"]), 2).unwrap();
        model
    }
}

fn assert_distribution(model: &MaxEntModel, predicates: &[Predicate]) {
    let probabilities = model.probabilities(predicates);
    assert_eq!(probabilities.len(), model.outcomes().len());
    let sum: f64 = probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-9, "{probabilities:?}");
    assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn gis_keyword_scenario() {
    let mut corpus = Corpus::new();
    let mut model = corpus.keyword_model(TrainOptions::default());
    let report = model.derive_model(1, 1e-6).unwrap();
    assert_eq!(report.constant_c, 1);
    assert_eq!(report.n_features, 2);
    assert_eq!(report.n_contexts, 2);
    assert_eq!(model.constant_c(), 1);
    assert!(model.correction_alpha().abs() < 1e-9);

    let (yes, no) = (corpus.yes, corpus.no);
    let with_keyword = corpus.event(yes, &["has_keyword"]);
    let p_yes = model.probability(&with_keyword).unwrap();
    assert!(p_yes > 0.5);
    assert!((p_yes - 8.0 / 9.0).abs() < 1e-4, "{p_yes}");
    let p_no = model
        .probability(&corpus.event(no, &["has_keyword"]))
        .unwrap();
    assert!((p_yes + p_no - 1.0).abs() < 1e-9);

    let without = corpus.event(yes, &[]);
    assert!((model.probability(&without).unwrap() - 0.5).abs() < 1e-6);

    // Unknown predicates do not contribute.
    let unseen = corpus.event(yes, &["never_seen"]);
    assert_eq!(model.score(&unseen), model.score(&without));
    assert_distribution(&model, with_keyword.predicates());
}

#[test]
fn probabilities_favor_correlated_outcome_in_every_mode() {
    for mode in TrainMode::ALL {
        let mut corpus = Corpus::new();
        let options = TrainOptions {
            mode,
            n_features_to_add: 2,
            ..Default::default()
        };
        let mut model = corpus.overlapping_model(options);
        let report = model.derive_model(1, 1e-6).unwrap();
        assert!(report.iterations >= 1, "{mode}");
        assert!(report.n_active_features <= report.n_features, "{mode}");
        if mode != TrainMode::Gis {
            assert_eq!(model.correction_alpha(), 0.0, "{mode}");
        }

        let (yes, no) = (corpus.yes, corpus.no);
        let kw = corpus.event(yes, &["kw"]);
        assert!(model.probability(&kw).unwrap() > 0.5, "{mode}");
        let b = corpus.event(no, &["b"]);
        assert!(model.probability(&b).unwrap() > 0.5, "{mode}");
        assert_distribution(&model, kw.predicates());
        assert_distribution(&model, corpus.event(yes, &["kw", "a", "b"]).predicates());
    }
}

#[test]
fn gaussian_prior_shrinks_weights() {
    let mut corpus = Corpus::new();
    let plain_options = TrainOptions {
        mode: TrainMode::Iis,
        ..Default::default()
    };
    let mut plain = corpus.overlapping_model(plain_options);
    plain.derive_model(1, 1e-6).unwrap();

    let smoothed_options = TrainOptions {
        mode: TrainMode::IisGaussian,
        variance: 0.1,
        ..Default::default()
    };
    let mut smoothed = corpus.overlapping_model(smoothed_options);
    smoothed.derive_model(1, 1e-6).unwrap();

    let magnitude =
        |model: &MaxEntModel| -> f64 { model.alphas().iter().map(|f| f.value.abs()).sum() };
    assert!(magnitude(&smoothed) < magnitude(&plain));
}

#[test]
fn training_is_deterministic() {
    let mut corpus = Corpus::new();
    let options = TrainOptions {
        mode: TrainMode::IisFeatureSelection,
        ..Default::default()
    };
    let mut first = corpus.overlapping_model(options.clone());
    let mut second = corpus.overlapping_model(options);
    first.derive_model(1, 1e-6).unwrap();
    second.derive_model(1, 1e-6).unwrap();

    assert_eq!(first.alphas().len(), second.alphas().len());
    for (a, b) in first.alphas().iter().zip(second.alphas().iter()) {
        assert_eq!(a.predicate, b.predicate);
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.value.to_bits(), b.value.to_bits());
    }
}

#[test]
fn held_out_events_are_split_off() {
    let mut corpus = Corpus::new();
    let options = TrainOptions {
        mode: TrainMode::Iis,
        stop_criterion: StopCriterion::HeldOutLikelihood,
        percent_held_out: 10,
        ..Default::default()
    };
    let mut model = corpus.keyword_model(options);
    let observed = model.observed_events().unwrap().n_events();
    let held_out = model.held_out_events().unwrap().n_events();
    assert_eq!(observed + held_out, 20);
    assert_eq!(held_out, 2);

    let report = model.derive_model(1, 1e-6).unwrap();
    assert!(report.held_out_likelihood.is_finite());
    assert!(report.held_out_likelihood < 0.0);
    assert!(report.training_likelihood < 0.0);
}

#[test]
fn pruning_failures_abort_training() {
    let mut corpus = Corpus::new();
    let mut model = corpus.model(TrainOptions::default());
    let (yes, no) = (corpus.yes, corpus.no);
    model.add_event(&corpus.event(yes, &["a"]), 3).unwrap();
    model.add_event(&corpus.event(no, &["b"]), 1).unwrap();

    let result = model.derive_model(2, 1e-6);
    assert!(matches!(result, Err(Error::UnexpectedInput { .. })));
    assert!(!model.is_trained());
}

#[test]
fn pruning_keeps_frequent_features() {
    let mut corpus = Corpus::new();
    let mut model = corpus.model(TrainOptions::default());
    let (yes, no) = (corpus.yes, corpus.no);
    model.add_event(&corpus.event(yes, &["kw", "rare"]), 1).unwrap();
    model.add_event(&corpus.event(yes, &["kw"]), 4).unwrap();
    model.add_event(&corpus.event(no, &["other"]), 5).unwrap();

    let report = model.derive_model(2, 1e-6).unwrap();
    assert_eq!(report.n_features, 2);
    assert_eq!(report.n_contexts, 2);
    let rare = corpus.symbols.intern("rare");
    assert_eq!(model.alphas().lookup(yes, &[rare]), 0.0);
    assert!(model.probability(&corpus.event(yes, &["kw"])).unwrap() > 0.5);
}

#[test]
fn unobserved_prior_features_keep_zero_weight() {
    let mut corpus = Corpus::new();
    let options = TrainOptions {
        mode: TrainMode::Iis,
        ..Default::default()
    };
    let mut model = corpus.keyword_model(options);
    model.add_prior_features().unwrap();
    let report = model.derive_model(1, 1e-6).unwrap();
    assert!(report.iterations > 1);

    let (yes, no) = (corpus.yes, corpus.no);
    for outcome in [yes, no] {
        assert_eq!(model.alphas().lookup(outcome, &[]), 0.0);
    }
    let with_keyword = corpus.event(yes, &["has_keyword"]);
    assert!(model.probability(&with_keyword).unwrap() > 0.5);
    let without = corpus.event(yes, &[]);
    assert!((model.probability(&without).unwrap() - 0.5).abs() < 1e-9);
}
