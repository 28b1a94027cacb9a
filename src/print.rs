//! Debug pretty-printer for a [`BitmapTree`]'s trie structure.

use crate::bitmap::BitmapTree;
use crate::node::{Node, Slot};

/// Prints an indented dump of `bmt`'s trie to stdout: one line per allocated
/// node, sentinel children shown inline, leaves shown as a hex bitmask.
pub(crate) fn print_tree(bmt: &BitmapTree) {
    println!(
        "BitmapTree {{ size: {}, levels: {} }}",
        bmt.size(),
        bmt.levels()
    );
    print_slot(bmt.top(), 0);
}

fn indent(depth: usize) {
    for _ in 0..depth {
        print!("  ");
    }
}

fn print_slot(slot: &Slot, depth: usize) {
    indent(depth);
    match slot {
        Slot::Empty => println!("EMPTY"),
        Slot::Full => println!("FULL"),
        Slot::Node(node) => match node.as_ref() {
            Node::Leaf { bits } => println!("leaf bits={bits:#018x}"),
            Node::Interior { level, zero, one } => {
                println!("interior level={level}");
                indent(depth + 1);
                println!("zero:");
                print_slot(zero, depth + 2);
                indent(depth + 1);
                println!("one:");
                print_slot(one, depth + 2);
            }
        },
    }
}
