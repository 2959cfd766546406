//! People and the companies they work at.

use log::info;

use super::{Direction, GraphDb, GraphError, properties};
use crate::demo::{DemoContext, banner};

/// Answers of the sample traversals.
#[derive(Debug, Default, PartialEq)]
pub struct Report {
    pub alice_works_at: Vec<String>,
    pub bob_knows: Vec<String>,
    pub tech_corp_employees: Vec<String>,
}

fn names(vertices: &[super::Vertex]) -> Vec<String> {
    vertices
        .iter()
        .filter_map(|v| v.name().map(str::to_owned))
        .collect()
}

pub async fn run(ctx: &DemoContext) -> Result<Report, GraphError> {
    banner("Graph");
    info!("Connected to {} (graph demo)", ctx.driver.name());

    let g = GraphDb::new(ctx.driver.clone(), ctx.namespace.as_str());

    g.add_vertex(
        "p1",
        "person",
        properties([
            ("name", "Alice".into()),
            ("age", 30.into()),
            ("city", "San Francisco".into()),
        ]),
    )
    .await?;
    g.add_vertex(
        "p2",
        "person",
        properties([
            ("name", "Bob".into()),
            ("age", 28.into()),
            ("city", "New York".into()),
        ]),
    )
    .await?;
    g.add_vertex(
        "p3",
        "person",
        properties([
            ("name", "Charlie".into()),
            ("age", 35.into()),
            ("city", "San Francisco".into()),
        ]),
    )
    .await?;

    g.add_vertex(
        "c1",
        "company",
        properties([
            ("name", "Tech Corp".into()),
            ("industry", "Technology".into()),
            ("location", "San Francisco".into()),
        ]),
    )
    .await?;
    g.add_vertex(
        "c2",
        "company",
        properties([
            ("name", "Data Inc".into()),
            ("industry", "Data Analytics".into()),
            ("location", "New York".into()),
        ]),
    )
    .await?;

    g.add_edge(
        "p1",
        "c1",
        "WORKS_AT",
        properties([("role", "Software Engineer".into()), ("since", 2020.into())]),
    )
    .await?;
    g.add_edge(
        "p2",
        "c2",
        "WORKS_AT",
        properties([("role", "Data Scientist".into()), ("since", 2021.into())]),
    )
    .await?;
    g.add_edge(
        "p3",
        "c1",
        "WORKS_AT",
        properties([("role", "Product Manager".into()), ("since", 2019.into())]),
    )
    .await?;

    g.add_edge(
        "p1",
        "p2",
        "KNOWS",
        properties([("since", 2019.into()), ("relationship", "colleague".into())]),
    )
    .await?;
    g.add_edge(
        "p2",
        "p3",
        "KNOWS",
        properties([("since", 2020.into()), ("relationship", "friend".into())]),
    )
    .await?;

    let mut report = Report::default();

    info!("Finding where Alice (p1) works:");
    report.alice_works_at = names(&g.get_neighbors("p1", "WORKS_AT", Direction::Out).await?);
    for company in &report.alice_works_at {
        info!("Alice works at {}", company);
    }

    info!("Finding who Bob (p2) knows:");
    report.bob_knows = names(&g.get_neighbors("p2", "KNOWS", Direction::Out).await?);
    for friend in &report.bob_knows {
        info!("Bob knows {}", friend);
    }

    info!("Finding employees at Tech Corp (c1):");
    report.tech_corp_employees = names(&g.get_neighbors("c1", "WORKS_AT", Direction::In).await?);
    for employee in &report.tech_corp_employees {
        info!("{} works at Tech Corp", employee);
    }

    Ok(report)
}
