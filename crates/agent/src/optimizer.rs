//! Constrained-optimization routing of a single ticket to one agent.
//!
//! Formulation: binary decision variables x_i (one per candidate agent),
//! objective `max Σ score_i·x_i` with `score_i = cos(t, s_i) − α·load_i /
//! max(1, cap_i)`, subject to `Σ x_i = 1`. The feasible region is exactly
//! the n one-hot vectors, so enumerating candidates and keeping the best
//! objective value solves the program exactly; ties go to the lowest
//! index.

use triage_core::{Agent, TicketCategory};

const INV_SQRT3: f64 = 0.577_350_269_189_625_8;

/// Unit-length skill vector for a ticket, derived from its category.
/// Components are ordered (tech, billing, legal).
pub fn ticket_skill_vector(category: TicketCategory) -> [f64; 3] {
    match category {
        TicketCategory::Technical => [1.0, 0.0, 0.0],
        TicketCategory::Billing => [0.0, 1.0, 0.0],
        TicketCategory::Legal => [0.0, 0.0, 1.0],
    }
}

/// Normalize to unit length; the zero vector maps to the uniform
/// direction so degenerate skill configs still route.
pub fn normalize(vec: [f64; 3]) -> [f64; 3] {
    let norm = vec.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm <= 0.0 {
        return [INV_SQRT3; 3];
    }
    [vec[0] / norm, vec[1] / norm, vec[2] / norm]
}

fn cosine(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot.clamp(-1.0, 1.0)
}

/// Per-agent assignment objective: skill match minus load penalty.
pub fn assignment_scores(
    category: TicketCategory,
    agents: &[Agent],
    load_penalty_factor: f64,
) -> Vec<f64> {
    let ticket_vec = ticket_skill_vector(category);
    agents
        .iter()
        .map(|agent| {
            let agent_vec = normalize(agent.skill_vector.as_array());
            let load_penalty = load_penalty_factor
                * (agent.current_load as f64 / agent.max_concurrent_tickets.max(1) as f64);
            cosine(&ticket_vec, &agent_vec) - load_penalty
        })
        .collect()
}

/// Solve the one-ticket assignment program over the candidate agents.
/// Returns the chosen agent id, or None for an empty candidate list.
pub fn solve_assignment(
    category: TicketCategory,
    agents: &[Agent],
    load_penalty_factor: f64,
) -> Option<String> {
    if agents.is_empty() {
        return None;
    }
    let scores = assignment_scores(category, agents, load_penalty_factor);
    let mut best_idx = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best_idx] {
            best_idx = i;
        }
    }
    Some(agents[best_idx].agent_id.clone())
}

#[cfg(test)]
mod tests {
    use triage_core::{AgentStatus, SkillVector};

    use super::*;

    fn agent(id: &str, skills: (f64, f64, f64), load: u32, cap: u32) -> Agent {
        Agent {
            agent_id: id.to_string(),
            display_name: id.to_string(),
            skill_vector: SkillVector {
                tech: skills.0,
                billing: skills.1,
                legal: skills.2,
            },
            max_concurrent_tickets: cap,
            current_load: load,
            status: AgentStatus::Online,
        }
    }

    #[test]
    fn skill_match_picks_the_specialist() {
        let agents = vec![
            agent("tech", (0.9, 0.05, 0.05), 0, 10),
            agent("billing", (0.05, 0.9, 0.05), 0, 10),
        ];
        assert_eq!(
            solve_assignment(TicketCategory::Technical, &agents, 0.1).as_deref(),
            Some("tech")
        );
        assert_eq!(
            solve_assignment(TicketCategory::Billing, &agents, 0.1).as_deref(),
            Some("billing")
        );
    }

    #[test]
    fn equal_skills_prefer_lower_load() {
        let agents = vec![
            agent("busy", (0.9, 0.05, 0.05), 9, 10),
            agent("idle", (0.9, 0.05, 0.05), 0, 10),
        ];
        assert_eq!(
            solve_assignment(TicketCategory::Technical, &agents, 0.1).as_deref(),
            Some("idle")
        );
    }

    #[test]
    fn exact_ties_break_to_lowest_index() {
        let agents = vec![
            agent("first", (0.9, 0.05, 0.05), 0, 10),
            agent("second", (0.9, 0.05, 0.05), 0, 10),
        ];
        assert_eq!(
            solve_assignment(TicketCategory::Technical, &agents, 0.1).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn empty_candidates_return_none() {
        assert_eq!(solve_assignment(TicketCategory::Technical, &[], 0.1), None);
    }

    #[test]
    fn zero_skill_vector_normalizes_uniform() {
        let n = normalize([0.0, 0.0, 0.0]);
        let norm: f64 = n.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!((n[0] - n[1]).abs() < 1e-12);
    }

    #[test]
    fn penalty_scales_with_relative_load() {
        let agents = vec![
            agent("half-full-small", (0.9, 0.05, 0.05), 4, 8),
            agent("half-full-large", (0.9, 0.05, 0.05), 5, 10),
        ];
        let scores = assignment_scores(TicketCategory::Technical, &agents, 0.1);
        assert!((scores[0] - scores[1]).abs() < 1e-12);
    }
}
