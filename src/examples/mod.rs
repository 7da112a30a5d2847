//! Sample formulas, grouped by the feature they exercise.
//!
//! Served to users as a starting point; every entry compiles.

/// `(category, formulas)` pairs.
pub const EXAMPLES: &[(&str, &[&str])] = &[
    (
        "Math Operations",
        &[
            "(product_sales + service_sales)",
            "(product_sales + service_sales) - operating_cost",
            "(product_sales + service_sales - operating_cost) / employee_count",
        ],
    ),
    (
        "Fixed Digit Operations",
        &[
            "product_sales * 1.15",
            "(product_sales + service_sales) / 12",
            "operating_cost * 0.85",
        ],
    ),
    (
        "IF Logic",
        &[
            "IF(employee_count > 50, \"Large\", \"Small\")",
            "IF((product_sales + service_sales) > 100000, \"High Revenue\", \"Standard\")",
            "IF(operating_cost > (product_sales + service_sales), \"Loss\", \"Profit\")",
        ],
    ),
    (
        "Aggregations",
        &[
            "(product_sales / SUM(product_sales)) * 100",
            "product_sales - AVG(product_sales)",
            "IF(product_sales > AVG(product_sales), \"Above Average\", \"Below Average\")",
        ],
    ),
    (
        "Combined Examples",
        &[
            "IF((product_sales + service_sales) > AVG(product_sales + service_sales), \"High Performer\", \"Standard Performer\")",
            "((product_sales + service_sales - operating_cost) / SUM(product_sales + service_sales - operating_cost)) * 100",
        ],
    ),
];

/// Every example formula, in category order.
pub fn all() -> impl Iterator<Item = &'static str> {
    EXAMPLES.iter().flat_map(|(_, formulas)| formulas.iter().copied())
}
