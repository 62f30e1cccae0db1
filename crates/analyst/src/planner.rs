// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Keyword matching of a free-text fetch decision onto warehouse calls.

use warehouse::DataRequest;

/// Fetched on a cold start when the decision named nothing.
pub const DEFAULT_REQUESTS: [DataRequest; 3] = [
    DataRequest::SalesMetrics { days: 30 },
    DataRequest::TopProducts { limit: 10 },
    DataRequest::SalesTrend { days: 30 },
];

/// Fetched when the fetch stage failed before holding anything.
pub const FALLBACK_REQUESTS: [DataRequest; 2] = [
    DataRequest::SalesMetrics { days: 30 },
    DataRequest::SalesTrend { days: 30 },
];

type Cues<'a> = &'a [(&'a [&'a str], u32)];

/// Every capability whose cue words appear in `decision`, in capability
/// order, with parameters read from number cues (first hit wins).
pub fn plan_fetches(decision: &str) -> Vec<DataRequest> {
    let text = decision.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| text.contains(w));
    let mut plan = Vec::new();

    if any(&["sales", "revenue", "metrics"]) {
        let days = pick(
            &text,
            &[
                (&["90", "ninety"], 90),
                (&["60", "sixty"], 60),
                (&["7", "seven", "week"], 7),
            ],
            30,
        );
        plan.push(DataRequest::SalesMetrics { days });
    }

    if any(&["trend", "line", "time series", "daily"]) {
        let days = pick(&text, &[(&["90"], 90), (&["60"], 60), (&["7"], 7)], 30);
        plan.push(DataRequest::SalesTrend { days });
    }

    if any(&["product", "top"]) {
        let limit = pick(&text, &[(&["20", "twenty"], 20), (&["5", "five"], 5)], 10);
        plan.push(DataRequest::TopProducts { limit });
    }

    if any(&["category", "categories", "breakdown"]) {
        plan.push(DataRequest::RevenueByCategory);
    }

    if any(&["monthly", "month", "comparison"]) {
        let months = pick(&text, &[(&["12"], 12), (&["3"], 3)], 6);
        plan.push(DataRequest::MonthlyComparison { months });
    }

    if text.contains("customer") && text.contains("segment") {
        plan.push(DataRequest::CustomerSegments);
    }

    if any(&["lifetime", "ltv", "top customer"]) {
        let limit = pick(&text, &[(&["20"], 20), (&["5"], 5)], 10);
        plan.push(DataRequest::CustomerLifetimeValue { limit });
    }

    plan
}

fn pick(text: &str, cues: Cues<'_>, default: u32) -> u32 {
    cues.iter()
        .find(|(words, _)| words.iter().any(|w| text.contains(w)))
        .map_or(default, |(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_products_question_plans_only_top_products() {
        assert_eq!(
            plan_fetches("Top products?"),
            vec![DataRequest::TopProducts { limit: 10 }]
        );
    }

    #[test]
    fn number_cues_pick_the_first_match() {
        assert_eq!(
            plan_fetches("Sales metrics for ninety days"),
            vec![DataRequest::SalesMetrics { days: 90 }]
        );
        // "7" is checked after "60"
        assert_eq!(
            plan_fetches("revenue over 60 or 7 days"),
            vec![DataRequest::SalesMetrics { days: 60 }]
        );
        assert_eq!(
            plan_fetches("the last week of revenue"),
            vec![DataRequest::SalesMetrics { days: 7 }]
        );
    }

    #[test]
    fn trend_only_reads_digit_cues() {
        assert_eq!(
            plan_fetches("daily numbers for ninety days"),
            vec![DataRequest::SalesTrend { days: 30 }]
        );
    }

    #[test]
    fn segments_need_both_words() {
        assert!(plan_fetches("segment breakdown")
            .iter()
            .all(|r| *r != DataRequest::CustomerSegments));
        assert!(plan_fetches("customer segments")
            .contains(&DataRequest::CustomerSegments));
    }

    #[test]
    fn several_capabilities_in_capability_order() {
        let plan = plan_fetches("Fetch LTV for the top 5 customers and a monthly comparison over 12 months");
        assert_eq!(
            plan,
            vec![
                DataRequest::TopProducts { limit: 5 },
                DataRequest::MonthlyComparison { months: 12 },
                DataRequest::CustomerLifetimeValue { limit: 5 },
            ]
        );
    }

    #[test]
    fn nothing_matches_unrelated_text() {
        assert!(plan_fetches("I am not sure.").is_empty());
    }
}
