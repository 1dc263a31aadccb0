//! End-to-end behaviour of the public API on small hand-written datasets.

use sylva_tree::{
    DecisionTreeConfig, Item, Model, NodeView, Predicate, PredicateSelection, PredicateSet,
    RandomForest, TreeError, Value, entropy, information_gain, split,
};

fn point(x: f64, category: &str) -> Item {
    Item::new().with("x", x).with("category", category)
}

/// Render a tree as indented lines, the way a viewer would walk it.
fn render(view: NodeView<'_>, depth: usize, out: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    match view {
        NodeView::Leaf { category, n_items } => out.push(format!("{pad}-> {category} ({n_items})")),
        NodeView::Split(split) => {
            out.push(format!("{pad}{split}?"));
            render(split.matched(), depth + 1, out);
            render(split.not_matched(), depth + 1, out);
        }
    }
}

#[test]
fn two_points_are_separated_with_greater_or_equal() {
    let items = vec![point(0.0, "A"), point(10.0, "B")];
    let config = DecisionTreeConfig::new()
        .with_category_attr("category")
        .with_min_items_count(1);
    let tree = config.fit(&items).unwrap();

    let mut lines = Vec::new();
    render(tree.root(), 0, &mut lines);
    assert_eq!(lines, ["x >= 10?", "  -> B (1)", "  -> A (1)"]);

    assert_eq!(tree.predict(&Item::new().with("x", 0.0)), &Value::from("A"));
    assert_eq!(tree.predict(&Item::new().with("x", 10.0)), &Value::from("B"));
}

#[test]
fn identical_categories_give_single_leaf() {
    let items: Vec<Item> = (0..100)
        .map(|i| {
            Item::new()
                .with("x", f64::from(i))
                .with("colour", if i % 2 == 0 { "red" } else { "blue" })
                .with("category", "same")
        })
        .collect();
    let tree = DecisionTreeConfig::new().fit(&items).unwrap();
    assert_eq!(tree.n_nodes(), 1);
    assert_eq!(tree.depth(), 0);
    match tree.root() {
        NodeView::Leaf { category, n_items } => {
            assert_eq!(category, &Value::from("same"));
            assert_eq!(n_items, 100);
        }
        NodeView::Split(_) => panic!("pure data must not split"),
    }
}

#[test]
fn five_tree_forest_always_casts_five_votes() {
    let items: Vec<Item> = (0..30)
        .map(|i| point(f64::from(i), if i < 15 { "low" } else { "high" }))
        .collect();
    let forest = RandomForest::train(&items, &DecisionTreeConfig::new(), 5).unwrap();
    for query in [
        Item::new().with("x", -100.0),
        Item::new().with("x", 14.5),
        Item::new().with("x", "not a number"),
        Item::new().with("y", 3.0),
    ] {
        assert_eq!(forest.predict(&query).total(), 5);
    }
}

#[test]
fn entropy_bounds_and_split_partition() {
    let items = vec![
        point(1.0, "A"),
        point(2.0, "B"),
        point(3.0, "C"),
        point(4.0, "A"),
        Item::new().with("category", "B"),
    ];
    let e = entropy(&items, "category");
    assert!(e > 0.0 && e <= 3.0_f64.ln() + 1e-12);

    let partition = split(&items, "x", Predicate::GreaterOrEqual, &Value::from(3.0));
    assert_eq!(partition.matched.len(), 2);
    assert_eq!(partition.not_matched.len(), 3);
    let gain = information_gain(&items, &partition, "category");
    assert!(gain <= e + 1e-12);
}

#[test]
fn winning_split_always_has_positive_gain() {
    let items: Vec<Item> = (0..40)
        .map(|i| {
            let category = match i % 4 {
                0 | 1 => "A",
                2 => "B",
                _ => "C",
            };
            Item::new()
                .with("x", f64::from(i % 7))
                .with("y", f64::from(i % 5))
                .with("category", category)
        })
        .collect();
    let tree = DecisionTreeConfig::new().fit(&items).unwrap();

    fn check(view: NodeView<'_>) {
        if let NodeView::Split(split) = view {
            assert!(split.gain() > 0.0, "{split} has gain {}", split.gain());
            check(split.matched());
            check(split.not_matched());
        }
    }
    check(tree.root());
}

#[test]
fn predicate_removal_mirrors_default_removal() {
    let items = vec![point(0.0, "A"), point(10.0, "B")];
    let predicates = PredicateSelection::Fixed(
        PredicateSet::all()
            .without(Predicate::Equals)
            .without(Predicate::GreaterOrEqual),
    );
    let tree = DecisionTreeConfig::new()
        .with_predicates(predicates)
        .fit(&items)
        .unwrap();
    let NodeView::Split(root) = tree.root() else {
        panic!("expected a split");
    };
    assert_eq!(root.predicate(), Predicate::LessOrEqual);
}

#[test]
fn training_twice_gives_identical_trees() {
    let items: Vec<Item> = (0..50)
        .map(|i| {
            Item::new()
                .with("a", f64::from(i % 9))
                .with("b", if i % 3 == 0 { "p" } else { "q" })
                .with("category", if i % 4 < 2 { "yes" } else { "no" })
        })
        .collect();
    let config = DecisionTreeConfig::new();
    assert_eq!(config.fit(&items).unwrap(), config.fit(&items).unwrap());
}

#[test]
fn items_without_category_are_rejected() {
    let items = vec![point(0.0, "A"), Item::new().with("x", 1.0)];
    let err = DecisionTreeConfig::new().fit(&items).unwrap_err();
    assert!(matches!(
        err,
        TreeError::MissingCategory { item_index: 1, .. }
    ));
}

#[test]
fn saved_model_predicts_the_same() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("model.bin");
    let items = vec![point(0.0, "A"), point(10.0, "B"), point(20.0, "C")];
    let tree = DecisionTreeConfig::new().fit(&items).unwrap();
    Model::Tree(tree.clone()).save(&path).unwrap();

    let Model::Tree(loaded) = Model::load(&path).unwrap() else {
        panic!("expected a tree");
    };
    for item in &items {
        assert_eq!(loaded.predict(item), tree.predict(item));
    }
}
