//! Record grouper: nests flat child rows under the parent row that precedes them.

use std::collections::BTreeMap;

use super::normalize::NormalizedRow;
use crate::errors::AppError;

/// What to do with a child row that appears before any parent in its scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Drop the row and report its line
    #[default]
    Drop,
    /// Fail the whole import
    Reject,
}

/// How rows are partitioned and which column opens a new parent.
#[derive(Debug, Clone, Copy)]
pub struct GroupRule<'a> {
    pub scope: &'a [&'a str],
    pub parent_marker: &'a str,
}

/// A parent row with the rows nested under it.
///
/// The marker row itself is the first child, since it carries child data too.
#[derive(Debug)]
pub struct ParentGroup<'r> {
    pub scope: Vec<String>,
    pub marker: String,
    pub parent: &'r NormalizedRow,
    pub children: Vec<&'r NormalizedRow>,
}

#[derive(Debug, Default)]
pub struct Grouped<'r> {
    pub groups: Vec<ParentGroup<'r>>,
    /// Source lines of dropped orphan rows
    pub orphans: Vec<usize>,
}

/// Group rows by scope, then by the most recent parent marker within each scope.
///
/// Scopes come out ordered by value; rows keep file order inside a scope.
pub fn group_rows<'r>(
    rows: &'r [NormalizedRow],
    rule: GroupRule<'_>,
    policy: OrphanPolicy,
) -> Result<Grouped<'r>, AppError> {
    let mut scopes: BTreeMap<Vec<String>, Vec<&'r NormalizedRow>> = BTreeMap::new();
    for row in rows {
        let scope = rule
            .scope
            .iter()
            .map(|column| row.text(column).unwrap_or_default())
            .collect();
        scopes.entry(scope).or_default().push(row);
    }

    let mut grouped = Grouped::default();

    for (scope, scope_rows) in scopes {
        let first_group = grouped.groups.len();
        let mut current: Option<usize> = None;

        for row in scope_rows {
            if let Some(marker) = row.text(rule.parent_marker) {
                let existing = grouped.groups[first_group..]
                    .iter()
                    .position(|g| g.marker == marker)
                    .map(|offset| first_group + offset);

                current = Some(existing.unwrap_or_else(|| {
                    grouped.groups.push(ParentGroup {
                        scope: scope.clone(),
                        marker,
                        parent: row,
                        children: Vec::new(),
                    });
                    grouped.groups.len() - 1
                }));
            }

            match current {
                Some(index) => grouped.groups[index].children.push(row),
                None => match policy {
                    OrphanPolicy::Drop => {
                        tracing::warn!(
                            "Line {}: no '{}' seen yet in {:?}, row dropped",
                            row.line,
                            rule.parent_marker,
                            scope
                        );
                        grouped.orphans.push(row.line);
                    }
                    OrphanPolicy::Reject => {
                        return Err(AppError::Validation(format!(
                            "Line {}: row has no '{}' and follows no unit in {}",
                            row.line,
                            rule.parent_marker,
                            scope.join("/")
                        )));
                    }
                },
            }
        }
    }

    grouped.orphans.sort_unstable();
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize::Cell;

    const RULE: GroupRule<'static> = GroupRule {
        scope: &["niveau", "semestre"],
        parent_marker: "code_ue",
    };

    fn row(line: usize, niveau: &str, semestre: &str, code: Option<&str>, nom: &str) -> NormalizedRow {
        NormalizedRow::new(
            line,
            vec![
                ("niveau".into(), Cell::text(niveau)),
                ("semestre".into(), Cell::text(semestre)),
                ("code_ue".into(), code.map(Cell::text).unwrap_or(Cell::Null)),
                ("nom_matiere".into(), Cell::text(nom)),
            ],
        )
    }

    fn names(group: &ParentGroup<'_>) -> Vec<String> {
        group
            .children
            .iter()
            .filter_map(|r| r.text("nom_matiere"))
            .collect()
    }

    #[test]
    fn test_rows_sharing_a_code_form_one_group() {
        let rows = vec![
            row(2, "FIE1", "S1", Some("UE1"), "Maths"),
            row(3, "FIE1", "S1", Some("UE1"), "Algebra"),
        ];

        let grouped = group_rows(&rows, RULE, OrphanPolicy::Drop).unwrap();
        assert_eq!(grouped.groups.len(), 1);
        assert_eq!(grouped.groups[0].marker, "UE1");
        assert_eq!(names(&grouped.groups[0]), vec!["Maths", "Algebra"]);
    }

    #[test]
    fn test_children_follow_most_recent_parent() {
        let rows = vec![
            row(2, "FIE1", "S1", Some("UE1"), "Maths"),
            row(3, "FIE1", "S1", None, "Analysis"),
            row(4, "FIE1", "S1", Some("UE2"), "Physics"),
            row(5, "FIE1", "S1", None, "Optics"),
        ];

        let grouped = group_rows(&rows, RULE, OrphanPolicy::Drop).unwrap();
        assert_eq!(grouped.groups.len(), 2);
        assert_eq!(names(&grouped.groups[0]), vec!["Maths", "Analysis"]);
        assert_eq!(names(&grouped.groups[1]), vec!["Physics", "Optics"]);
        assert_eq!(grouped.groups[1].parent.line, 4);
    }

    #[test]
    fn test_scopes_are_separate_and_sorted() {
        let rows = vec![
            row(2, "FIE2", "S1", Some("UE1"), "Networks"),
            row(3, "FIE1", "S2", Some("UE1"), "Maths"),
            row(4, "FIE2", "S1", None, "Routing"),
        ];

        let grouped = group_rows(&rows, RULE, OrphanPolicy::Drop).unwrap();
        assert_eq!(grouped.groups.len(), 2);
        assert_eq!(grouped.groups[0].scope, vec!["FIE1", "S2"]);
        assert_eq!(grouped.groups[1].scope, vec!["FIE2", "S1"]);
        assert_eq!(names(&grouped.groups[1]), vec!["Networks", "Routing"]);
    }

    #[test]
    fn test_orphans_dropped_and_reported() {
        let rows = vec![
            row(2, "FIE1", "S1", None, "Lost"),
            row(3, "FIE1", "S1", Some("UE1"), "Maths"),
            row(4, "FIE3", "S1", None, "Also lost"),
        ];

        let grouped = group_rows(&rows, RULE, OrphanPolicy::Drop).unwrap();
        assert_eq!(grouped.groups.len(), 1);
        assert_eq!(grouped.orphans, vec![2, 4]);
    }

    #[test]
    fn test_orphans_rejected_when_configured() {
        let rows = vec![row(2, "FIE1", "S1", None, "Lost")];
        assert!(matches!(
            group_rows(&rows, RULE, OrphanPolicy::Reject),
            Err(AppError::Validation(_))
        ));
    }
}
