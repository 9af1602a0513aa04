use crate::expression::Expr;
use crate::Env;

/// How an unbound variable appears in rendered text.
///
/// Formulas use `{name}` placeholders; condition atoms produced by the
/// backward solver use bare names ("age > 18").
#[derive(Clone, Copy, Debug)]
pub(crate) enum VarStyle {
    Placeholder,
    Bare,
}

impl Expr {
    /// Renders the expression as a human-readable formula, substituting bound
    /// values and leaving free variables as `{name}` placeholders.
    ///
    /// Purely structural: nothing is evaluated, and rendering is idempotent
    /// for a fixed `(node, env)` pair.
    pub fn render(&self, env: &Env) -> String {
        self.render_with(env, VarStyle::Placeholder)
    }

    /// Condition-atom text for the backward solver.
    pub(crate) fn condition_text(&self) -> String {
        self.render_with(&Env::new(), VarStyle::Bare)
    }

    pub(crate) fn render_with(&self, env: &Env, style: VarStyle) -> String {
        match self {
            Expr::Const(value) => value.to_string(),

            Expr::Variable(name) => match env.get(name) {
                Some(value) => value.to_string(),
                None => match style {
                    VarStyle::Placeholder => format!("{{{name}}}"),
                    VarStyle::Bare => name.clone(),
                },
            },

            Expr::Unary { op, operand } => {
                fill(op.template(), "{operand}", &operand.render_with(env, style))
            }

            Expr::Binary { op, lhs, rhs } => {
                let with_rhs = fill(op.template(), "{rhs}", &rhs.render_with(env, style));
                fill(&with_rhs, "{lhs}", &lhs.render_with(env, style))
            }

            Expr::Curry { inner, bound } => {
                let mut merged = env.clone();
                for (name, value) in bound {
                    merged = merged.bind(name.clone(), value.clone());
                }
                inner.render_with(&merged, style)
            }

            Expr::And(children) => children
                .iter()
                .map(|child| child.render_with(env, style))
                .collect::<Vec<_>>()
                .join(" and "),

            Expr::Or(children) => children
                .iter()
                .map(|child| child.render_with(env, style))
                .collect::<Vec<_>>()
                .join(" or "),

            Expr::Select {
                condition,
                then_branch,
                else_branch,
            } => format!(
                "if ({}) then [{}] else [{}]",
                condition.render_with(env, style),
                then_branch.render_with(env, style),
                else_branch.render_with(env, style),
            ),

            Expr::Between { subject, min, max } => {
                let subject = subject.render_with(env, style);
                match (min, max) {
                    (Some(min), Some(max)) => format!(
                        "{subject} 在 ({})~({}) 范围内",
                        min.render_with(env, style),
                        max.render_with(env, style),
                    ),
                    (Some(min), None) => {
                        format!("{subject} 大于 ({})", min.render_with(env, style))
                    }
                    (None, Some(max)) => {
                        format!("{subject} 小于 ({})", max.render_with(env, style))
                    }
                    (None, None) => format!("{subject} 在 (-∞)~(+∞) 范围内"),
                }
            }
        }
    }
}

/// Substitutes one template slot in a single forward pass. The slot position
/// comes from the template alone, so substituted text that happens to contain
/// a slot marker stays literal. `{rhs}` is filled before `{lhs}`: every
/// binary template lists `{lhs}` first, keeping both splits on the original
/// slot.
fn fill(template: &str, slot: &str, text: &str) -> String {
    match template.split_once(slot) {
        Some((head, tail)) => format!("{head}{text}{tail}"),
        None => template.to_string(),
    }
}
