//! The two generic traversals of §4.3: [`Reconstructor`] (rebuild-with-
//! override-hooks) and [`Folder`] (monoid fold).

use super::{BoolExpr, InstructionIdExpr, LocationIdExpr, MatchIdExpr, NodeIdExpr, NumExpr};

/// Rebuilds a constraint tree, visiting every child before delegating to
/// the one `mk_<sort>_expr` hook a caller overrides to perform a targeted
/// rewrite. The default hooks are the identity, so a reconstructor that
/// overrides nothing reproduces its input exactly.
pub trait Reconstructor {
    fn mk_node_expr(&mut self, e: NodeIdExpr) -> NodeIdExpr {
        e
    }
    fn mk_match_expr(&mut self, e: MatchIdExpr) -> MatchIdExpr {
        e
    }
    fn mk_location_expr(&mut self, e: LocationIdExpr) -> LocationIdExpr {
        e
    }
    fn mk_instruction_expr(&mut self, e: InstructionIdExpr) -> InstructionIdExpr {
        e
    }

    fn reconstruct_node(&mut self, e: &NodeIdExpr) -> NodeIdExpr {
        let rebuilt = match e {
            NodeIdExpr::Id(id) => NodeIdExpr::Id(*id),
            NodeIdExpr::ArrayIndex(i) => NodeIdExpr::ArrayIndex(*i),
            NodeIdExpr::BlockOfBlockNode(n) => {
                NodeIdExpr::BlockOfBlockNode(Box::new(self.reconstruct_node(n)))
            }
            NodeIdExpr::BlockWhereinMatchIsPlaced(m) => {
                NodeIdExpr::BlockWhereinMatchIsPlaced(Box::new(self.reconstruct_match(m)))
            }
        };
        self.mk_node_expr(rebuilt)
    }

    fn reconstruct_match(&mut self, e: &MatchIdExpr) -> MatchIdExpr {
        let rebuilt = e.clone();
        self.mk_match_expr(rebuilt)
    }

    fn reconstruct_location(&mut self, e: &LocationIdExpr) -> LocationIdExpr {
        let rebuilt = match e {
            LocationIdExpr::Id(id) => LocationIdExpr::Id(*id),
            LocationIdExpr::ArrayIndex(i) => LocationIdExpr::ArrayIndex(*i),
            LocationIdExpr::LocationOfValueNode(n) => {
                LocationIdExpr::LocationOfValueNode(Box::new(self.reconstruct_node(n)))
            }
        };
        self.mk_location_expr(rebuilt)
    }

    fn reconstruct_instruction(&mut self, e: &InstructionIdExpr) -> InstructionIdExpr {
        let rebuilt = e.clone();
        self.mk_instruction_expr(rebuilt)
    }

    fn reconstruct_num(&mut self, e: &NumExpr) -> NumExpr {
        match e {
            NumExpr::IntLiteral(v) => NumExpr::IntLiteral(*v),
            NumExpr::Plus(a, b) => {
                NumExpr::Plus(Box::new(self.reconstruct_num(a)), Box::new(self.reconstruct_num(b)))
            }
            NumExpr::Minus(a, b) => {
                NumExpr::Minus(Box::new(self.reconstruct_num(a)), Box::new(self.reconstruct_num(b)))
            }
            NumExpr::Node(n) => NumExpr::Node(self.reconstruct_node(n)),
            NumExpr::Match(m) => NumExpr::Match(self.reconstruct_match(m)),
            NumExpr::Location(l) => NumExpr::Location(self.reconstruct_location(l)),
            NumExpr::Instruction(i) => NumExpr::Instruction(self.reconstruct_instruction(i)),
        }
    }

    fn reconstruct_bool(&mut self, e: &BoolExpr) -> BoolExpr {
        match e {
            BoolExpr::Eq(a, b) => {
                BoolExpr::Eq(Box::new(self.reconstruct_num(a)), Box::new(self.reconstruct_num(b)))
            }
            BoolExpr::Lt(a, b) => {
                BoolExpr::Lt(Box::new(self.reconstruct_num(a)), Box::new(self.reconstruct_num(b)))
            }
            BoolExpr::Le(a, b) => {
                BoolExpr::Le(Box::new(self.reconstruct_num(a)), Box::new(self.reconstruct_num(b)))
            }
            BoolExpr::Gt(a, b) => {
                BoolExpr::Gt(Box::new(self.reconstruct_num(a)), Box::new(self.reconstruct_num(b)))
            }
            BoolExpr::Ge(a, b) => {
                BoolExpr::Ge(Box::new(self.reconstruct_num(a)), Box::new(self.reconstruct_num(b)))
            }
            BoolExpr::InSet(a, set) => BoolExpr::InSet(
                Box::new(self.reconstruct_num(a)),
                set.iter().map(|x| self.reconstruct_num(x)).collect(),
            ),
            BoolExpr::And(cs) => BoolExpr::And(cs.iter().map(|c| self.reconstruct_bool(c)).collect()),
            BoolExpr::Or(cs) => BoolExpr::Or(cs.iter().map(|c| self.reconstruct_bool(c)).collect()),
            BoolExpr::Implies(a, b) => BoolExpr::Implies(
                Box::new(self.reconstruct_bool(a)),
                Box::new(self.reconstruct_bool(b)),
            ),
            BoolExpr::Not(a) => BoolExpr::Not(Box::new(self.reconstruct_bool(a))),
            BoolExpr::FallThrough(n) => BoolExpr::FallThrough(self.reconstruct_node(n)),
            BoolExpr::DistanceLe(a, b, k) => BoolExpr::DistanceLe(
                Box::new(self.reconstruct_num(a)),
                Box::new(self.reconstruct_num(b)),
                *k,
            ),
        }
    }
}

/// Folds a constraint tree into a caller-supplied monoid `T`: `unit()` is
/// the identity element and `combine` the associative binary operator.
/// Each `fold_<sort>_expr` hook receives the already-folded value of its
/// children and may override it; the default is to pass it through
/// unchanged.
pub trait Folder<T: Clone> {
    fn unit(&self) -> T;
    fn combine(&self, a: T, b: T) -> T;

    fn fold_node_expr(&mut self, _e: &NodeIdExpr, children: T) -> T {
        children
    }
    fn fold_match_expr(&mut self, _e: &MatchIdExpr, children: T) -> T {
        children
    }
    fn fold_location_expr(&mut self, _e: &LocationIdExpr, children: T) -> T {
        children
    }
    fn fold_instruction_expr(&mut self, _e: &InstructionIdExpr, children: T) -> T {
        children
    }

    fn fold_node(&mut self, e: &NodeIdExpr) -> T {
        let children = match e {
            NodeIdExpr::Id(_) | NodeIdExpr::ArrayIndex(_) => self.unit(),
            NodeIdExpr::BlockOfBlockNode(n) => self.fold_node(n),
            NodeIdExpr::BlockWhereinMatchIsPlaced(m) => self.fold_match(m),
        };
        self.fold_node_expr(e, children)
    }

    fn fold_match(&mut self, e: &MatchIdExpr) -> T {
        let children = self.unit();
        self.fold_match_expr(e, children)
    }

    fn fold_location(&mut self, e: &LocationIdExpr) -> T {
        let children = match e {
            LocationIdExpr::Id(_) | LocationIdExpr::ArrayIndex(_) => self.unit(),
            LocationIdExpr::LocationOfValueNode(n) => self.fold_node(n),
        };
        self.fold_location_expr(e, children)
    }

    fn fold_instruction(&mut self, e: &InstructionIdExpr) -> T {
        let children = self.unit();
        self.fold_instruction_expr(e, children)
    }

    fn fold_num(&mut self, e: &NumExpr) -> T {
        match e {
            NumExpr::IntLiteral(_) => self.unit(),
            NumExpr::Plus(a, b) | NumExpr::Minus(a, b) => {
                let l = self.fold_num(a);
                let r = self.fold_num(b);
                self.combine(l, r)
            }
            NumExpr::Node(n) => self.fold_node(n),
            NumExpr::Match(m) => self.fold_match(m),
            NumExpr::Location(l) => self.fold_location(l),
            NumExpr::Instruction(i) => self.fold_instruction(i),
        }
    }

    fn fold_bool(&mut self, e: &BoolExpr) -> T {
        match e {
            BoolExpr::Eq(a, b)
            | BoolExpr::Lt(a, b)
            | BoolExpr::Le(a, b)
            | BoolExpr::Gt(a, b)
            | BoolExpr::Ge(a, b) => {
                let l = self.fold_num(a);
                let r = self.fold_num(b);
                self.combine(l, r)
            }
            BoolExpr::InSet(a, set) => {
                let mut acc = self.fold_num(a);
                for x in set {
                    let v = self.fold_num(x);
                    acc = self.combine(acc, v);
                }
                acc
            }
            BoolExpr::And(cs) | BoolExpr::Or(cs) => {
                let mut acc = self.unit();
                for c in cs {
                    let v = self.fold_bool(c);
                    acc = self.combine(acc, v);
                }
                acc
            }
            BoolExpr::Implies(a, b) => {
                let l = self.fold_bool(a);
                let r = self.fold_bool(b);
                self.combine(l, r)
            }
            BoolExpr::Not(a) => self.fold_bool(a),
            BoolExpr::FallThrough(n) => self.fold_node(n),
            BoolExpr::DistanceLe(a, b, _) => {
                let l = self.fold_num(a);
                let r = self.fold_num(b);
                self.combine(l, r)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::NodeIdExpr;

    struct ReplaceLeaf {
        from: PubIdForTest,
        to: PubIdForTest,
    }
    type PubIdForTest = u32;
    impl Reconstructor for ReplaceLeaf {
        fn mk_node_expr(&mut self, e: NodeIdExpr) -> NodeIdExpr {
            match e {
                NodeIdExpr::Id(id) if id == self.from => NodeIdExpr::Id(self.to),
                other => other,
            }
        }
    }

    #[test]
    fn reconstructor_rewrites_only_targeted_leaves() {
        let mut r = ReplaceLeaf { from: 1, to: 99 };
        let c = BoolExpr::Eq(
            Box::new(NumExpr::Node(NodeIdExpr::Id(1))),
            Box::new(NumExpr::Node(NodeIdExpr::Id(2))),
        );
        let rewritten = r.reconstruct_bool(&c);
        assert_eq!(
            rewritten,
            BoolExpr::Eq(
                Box::new(NumExpr::Node(NodeIdExpr::Id(99))),
                Box::new(NumExpr::Node(NodeIdExpr::Id(2)))
            )
        );
    }

    struct CountLeaves;
    impl Folder<u32> for CountLeaves {
        fn unit(&self) -> u32 {
            0
        }
        fn combine(&self, a: u32, b: u32) -> u32 {
            a + b
        }
        fn fold_node_expr(&mut self, e: &NodeIdExpr, children: u32) -> u32 {
            match e {
                NodeIdExpr::Id(_) => children + 1,
                _ => children,
            }
        }
    }

    #[test]
    fn folder_counts_node_leaves() {
        let mut f = CountLeaves;
        let c = BoolExpr::And(vec![
            BoolExpr::Eq(
                Box::new(NumExpr::Node(NodeIdExpr::Id(1))),
                Box::new(NumExpr::Node(NodeIdExpr::Id(2))),
            ),
            BoolExpr::Not(Box::new(BoolExpr::FallThrough(NodeIdExpr::Id(3)))),
        ]);
        assert_eq!(f.fold_bool(&c), 3);
    }
}
