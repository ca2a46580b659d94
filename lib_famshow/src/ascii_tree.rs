use log::trace;

use crate::newick::{Clade, Tree};


pub const DEFAULT_COLUMN_WIDTH: usize = 80;

/// Drawing coordinates of a clade.
struct Placement {
    column: usize,
    row: usize,
    children: Vec<Placement>,
}

struct Scale {
    columns_per_unit: f64,
    unit_branch_lengths: bool,
}

/// Draws the tree as a dendrogram that fits into `column_width` characters.
///
/// Terminals occupy every other row, labelled on the right.
/// Columns are proportional to the depth of a clade below the root.
/// If the tree carries no branch lengths, every branch counts as one unit.
pub fn draw_ascii(tree: &Tree, column_width: usize) -> String {
    let terminals = tree.terminals();
    let max_label_width = terminals
        .iter()
        .map(|terminal| terminal.label().chars().count())
        .max()
        .unwrap_or(0);
    let drawing_width = column_width.saturating_sub(max_label_width + 1).max(1);
    let drawing_height = 2 * terminals.len() - 1;

    let root_depth = tree.root.branch_length.unwrap_or(0.0);
    let mut unit_branch_lengths = false;
    let mut max_depth = deepest(&tree.root, root_depth, unit_branch_lengths);
    if max_depth <= 0.0 {
        unit_branch_lengths = true;
        max_depth = deepest(&tree.root, root_depth, unit_branch_lengths);
    }

    // Rounding may push a clade one column to the right per tree layer.
    let margin = (terminals.len() as f64).log2().ceil();
    let columns_per_unit = if max_depth > 0.0 {
        (drawing_width as f64 - margin) / max_depth
    } else {
        0.0
    };
    trace!(
        "Drawing {} terminals into {drawing_width}x{drawing_height} characters",
        terminals.len()
    );

    let scale = Scale {
        columns_per_unit,
        unit_branch_lengths,
    };
    let mut next_terminal = 0;
    let layout = place(&tree.root, root_depth, &scale, &mut next_terminal);

    let mut canvas = vec![vec![' '; drawing_width]; drawing_height];
    draw(&layout, 0, &mut canvas);

    let mut output = String::new();
    for (index, row) in canvas.iter().enumerate() {
        let line: String = row.iter().collect();
        output.push_str(line.trim_end());
        if index % 2 == 0 {
            output.push(' ');
            output.push_str(terminals[index / 2].label());
        }
        output.push('\n');
    }
    output.push('\n');
    output
}

fn branch_length(clade: &Clade, unit_branch_lengths: bool) -> f64 {
    if unit_branch_lengths {
        1.0
    } else {
        clade.branch_length.unwrap_or(0.0)
    }
}

fn deepest(clade: &Clade, depth: f64, unit_branch_lengths: bool) -> f64 {
    clade
        .children
        .iter()
        .map(|child| {
            deepest(
                child,
                depth + branch_length(child, unit_branch_lengths),
                unit_branch_lengths,
            )
        })
        .fold(depth, f64::max)
}

fn place(clade: &Clade, depth: f64, scale: &Scale, next_terminal: &mut usize) -> Placement {
    let column = (depth * scale.columns_per_unit + 1.0).max(0.0) as usize;

    if clade.is_terminal() {
        let row = 2 * *next_terminal;
        *next_terminal += 1;
        return Placement {
            column,
            row,
            children: Vec::new(),
        };
    }

    let children: Vec<_> = clade
        .children
        .iter()
        .map(|child| {
            place(
                child,
                depth + branch_length(child, scale.unit_branch_lengths),
                scale,
                next_terminal,
            )
        })
        .collect();
    let row = (children[0].row + children[children.len() - 1].row) / 2;

    Placement {
        column,
        row,
        children,
    }
}

fn draw(placement: &Placement, start_column: usize, canvas: &mut [Vec<char>]) {
    let width = canvas[placement.row].len();
    for column in start_column..placement.column.min(width) {
        canvas[placement.row][column] = '_';
    }

    let (Some(first), Some(last)) = (placement.children.first(), placement.children.last()) else {
        return;
    };

    if placement.column < width {
        for row in first.row + 1..=last.row {
            canvas[row][placement.column] = '|';
        }
        // Short first branches would otherwise vanish when trailing spaces are trimmed.
        if first.column < placement.column + 2 {
            canvas[first.row][placement.column] = ',';
        }
    }

    for child in &placement.children {
        draw(child, placement.column + 1, canvas);
    }
}
