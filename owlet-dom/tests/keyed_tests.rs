use owlet_dom::memory::Mutation;
use owlet_dom::{HostAdapter, HostNode, MemoryHost, Patcher, VNode, h, text};
use pretty_assertions::assert_eq;

fn list(keys: &[&str]) -> VNode {
    h(
        "ul",
        (),
        keys.iter().map(|k| h("li", (), vec![text(*k)]).with_key(*k)).collect(),
    )
}

fn rendered(host: &MemoryHost, ul: HostNode) -> Vec<String> {
    host.children(ul)
        .into_iter()
        .map(|li| host.text_content(li).unwrap_or_default())
        .collect()
}

fn creates(host: &MemoryHost) -> usize {
    host.mutations().iter().filter(|m| matches!(m, Mutation::Create(_))).count()
}

fn removes(host: &MemoryHost) -> usize {
    host.mutations().iter().filter(|m| matches!(m, Mutation::Remove { .. })).count()
}

/// Patches `from` into a fresh host, then patches `to` on top of it.
fn transition(from: &[&str], to: &[&str]) -> (MemoryHost, HostNode, Vec<HostNode>, Vec<HostNode>) {
    let mut host = MemoryHost::new();
    let mut patcher = Patcher::new();
    let root = host.create_element("div");
    let first = patcher.patch(&mut host, root, list(from));
    let ul = first.host.unwrap();
    let before = host.children(ul);
    host.clear_mutations();

    let second = patcher.patch(&mut host, first, list(to));
    assert_eq!(second.host, Some(ul));
    let after = host.children(ul);
    (host, ul, before, after)
}

#[test]
fn pure_append() {
    let (host, ul, before, after) = transition(&["a", "b"], &["a", "b", "c", "d"]);
    assert_eq!(rendered(&host, ul), vec!["a", "b", "c", "d"]);
    assert_eq!(&after[..2], &before[..]);
    assert_eq!(removes(&host), 0);
}

#[test]
fn pure_prepend() {
    let (host, ul, before, after) = transition(&["c", "d"], &["a", "b", "c", "d"]);
    assert_eq!(rendered(&host, ul), vec!["a", "b", "c", "d"]);
    assert_eq!(&after[2..], &before[..]);
    assert_eq!(removes(&host), 0);
}

#[test]
fn first_last_swap_only_moves() {
    let (host, ul, before, after) = transition(&["a", "b", "c", "d"], &["d", "b", "c", "a"]);
    assert_eq!(rendered(&host, ul), vec!["d", "b", "c", "a"]);
    assert_eq!(after, vec![before[3], before[1], before[2], before[0]]);
    assert_eq!(creates(&host), 0);
    assert_eq!(removes(&host), 0);
}

#[test]
fn full_reversal_only_moves() {
    let (host, ul, before, after) = transition(&["a", "b", "c", "d", "e"], &["e", "d", "c", "b", "a"]);
    assert_eq!(rendered(&host, ul), vec!["e", "d", "c", "b", "a"]);
    let mut reversed = before.clone();
    reversed.reverse();
    assert_eq!(after, reversed);
    assert_eq!(creates(&host), 0);
    assert_eq!(removes(&host), 0);
    assert!(host.mutations().iter().all(|m| matches!(m, Mutation::Move { .. })));
}

#[test]
fn shuffle_uses_key_index() {
    let (host, ul, before, after) = transition(&["a", "b", "c", "d", "e"], &["c", "e", "a", "d", "b"]);
    assert_eq!(rendered(&host, ul), vec!["c", "e", "a", "d", "b"]);
    assert_eq!(after, vec![before[2], before[4], before[0], before[3], before[1]]);
    assert_eq!(creates(&host), 0);
    assert_eq!(removes(&host), 0);
}

#[test]
fn interleaved_insert_and_delete() {
    let (host, ul, before, after) = transition(&["a", "b", "c"], &["a", "x", "c", "y"]);
    assert_eq!(rendered(&host, ul), vec!["a", "x", "c", "y"]);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[2]);
    assert_eq!(removes(&host), 1);
    assert!(!host.children(ul).contains(&before[1]));
}

#[test]
fn clear_and_refill() {
    let (host, ul, _, after) = transition(&["a", "b"], &[]);
    assert!(after.is_empty());
    assert_eq!(removes(&host), 2);
    assert_eq!(rendered(&host, ul), Vec::<String>::new());
}

#[test]
fn same_key_different_tag_is_recreated() {
    let mut host = MemoryHost::new();
    let mut patcher = Patcher::new();
    let root = host.create_element("div");
    let old = h("div", (), vec![h("p", (), vec![]).with_key("k"), h("i", (), vec![]).with_key("z")]);
    let old = patcher.patch(&mut host, root, old);
    let p = old.children[0].host.unwrap();
    let new = h("div", (), vec![h("i", (), vec![]).with_key("z"), h("b", (), vec![]).with_key("k")]);
    let new = patcher.patch(&mut host, old, new);
    assert_ne!(new.children[1].host, Some(p));
    assert_eq!(host.tag_name(new.children[1].host.unwrap()).as_deref(), Some("b"));
    assert_eq!(host.parent(p), None);
}
