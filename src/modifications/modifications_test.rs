use super::*;

fn p(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(String::from).collect()
}

fn children(
    mods: &Modifications,
    path: &str,
) -> Vec<String> {
    mods.get(&p(path))
        .map(|node| node.children.keys().cloned().collect())
        .unwrap_or_default()
}

#[test]
fn add_records_paths() {
    let mut mods = Modifications::new();
    mods.add(&p("app/Settings/Count"));
    mods.add(&p("app/Settings/Name"));

    assert_eq!(children(&mods, "app/Settings"), vec!["Count", "Name"]);
    assert!(mods.get(&p("app/Settings/Count")).is_some_and(|n| n.children.is_empty()));
    assert!(mods.get(&p("app/Other")).is_none());
}

#[test]
fn shallower_add_collapses_deeper_entries() {
    let mut mods = Modifications::new();
    mods.add(&p("app/Settings/Count"));
    mods.add(&p("app/Settings/Name"));
    mods.add(&p("app/Settings"));

    assert_eq!(children(&mods, "app"), vec!["Settings"]);
    assert!(children(&mods, "app/Settings").is_empty());
}

#[test]
fn deeper_add_below_a_leaf_is_subsumed() {
    let mut mods = Modifications::new();
    mods.add(&p("app/Users/alice"));
    mods.add(&p("app/Users/alice/Name"));

    assert_eq!(children(&mods, "app/Users"), vec!["alice"]);
    assert!(mods.get(&p("app/Users/alice/Name")).is_none());
}

#[test]
fn adding_the_same_path_twice_keeps_one_entry() {
    let mut mods = Modifications::new();
    mods.add(&p("app/Settings/Count"));
    mods.add(&p("app/Settings/Count"));

    assert_eq!(children(&mods, "app/Settings"), vec!["Count"]);
}

#[test]
fn new_tree_is_empty_until_a_path_is_added() {
    let mut mods = Modifications::new();

    assert!(mods.is_empty());
    assert!(mods.root().children.is_empty());
    assert!(mods.get(&p("app")).is_none());

    mods.add(&p("app"));
    assert!(!mods.is_empty());
}
