//! CLI report surface: renders the store's aggregate queries as fixed-width
//! text tables. Purely presentational - no data processing happens here.

use crate::db::{Database, StoreError};

const TOP_COMPANIES: usize = 20;
const TOP_SKILLS: usize = 50;
const RECENT_JOBS: usize = 10;

pub fn print_report(db: &Database) -> Result<(), StoreError> {
    let kpis = db.kpis()?;
    println!("Job market report");
    println!("{}", "=".repeat(60));
    println!("Total jobs:       {}", kpis.total_jobs);
    println!("Unique companies: {}", kpis.companies);
    println!("Remote share:     {:.1}%", 100.0 * kpis.remote_share);

    println!("\nJobs by category");
    println!("{:<40} {:>8}", "CATEGORY", "COUNT");
    println!("{}", "-".repeat(49));
    for (category, count) in db.jobs_by_category()? {
        println!("{:<40} {:>8}", truncate(&category, 38), count);
    }

    println!("\nTop companies");
    println!("{:<40} {:>8}", "COMPANY", "COUNT");
    println!("{}", "-".repeat(49));
    for (company, count) in db.top_companies(TOP_COMPANIES)? {
        println!("{:<40} {:>8}", truncate(&company, 38), count);
    }

    println!("\nSkill combinations");
    println!("{:<50} {:>8}", "SKILLS", "COUNT");
    println!("{}", "-".repeat(59));
    for (skills, count) in db.skill_frequency(TOP_SKILLS)? {
        let label = if skills.is_empty() { "(none)" } else { &skills };
        println!("{:<50} {:>8}", truncate(label, 48), count);
    }

    let stats = db.usd_salary_stats()?;
    println!("\nUSD salaries (postings with a stated minimum)");
    println!("Postings: {}", stats.n);
    match (stats.avg_min, stats.avg_max) {
        (Some(min), Some(max)) => {
            println!("Avg min:  ${:.0}", min);
            println!("Avg max:  ${:.0}", max);
        }
        _ => println!("No salary data available."),
    }

    println!("\nRemote vs onsite");
    for (remote, count) in db.remote_counts()? {
        let label = if remote { "remote" } else { "onsite" };
        println!("{:<10} {:>8}", label, count);
    }

    println!("\nRecent postings");
    println!(
        "{:<20} {:<30} {:<20} {:<16}",
        "PUBLISHED", "TITLE", "COMPANY", "LOCATION"
    );
    println!("{}", "-".repeat(88));
    for job in db.recent_jobs(RECENT_JOBS)? {
        println!(
            "{:<20} {:<30} {:<20} {:<16}",
            truncate(job.publication_date.as_deref().unwrap_or("-"), 18),
            truncate(&job.title, 28),
            truncate(&job.company_name, 18),
            truncate(&job.location, 14)
        );
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        // Cut by characters, not bytes, so multibyte text cannot split
        // mid-character.
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings_intact() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a string that is too long", 10), "a strin...");
    }

    #[test]
    fn truncate_cuts_on_char_boundaries() {
        // Multibyte text must never split mid-character.
        assert_eq!(
            truncate("Ingénieur de données très sénior", 10),
            "Ingénie..."
        );
        assert_eq!(
            truncate("aaaaaaaaaaaaaaaaaaaaaaaaé plus a long tail here", 28),
            "aaaaaaaaaaaaaaaaaaaaaaaaé..."
        );
        assert_eq!(truncate("日本語のタイトル", 20), "日本語のタイトル");
    }
}
