use dotenv::dotenv;
use sales_lead_kpis::{BackendConfig, DashboardSnapshot, KpiService, PostgrestClient};
use std::fs::File;
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    println!("🚀 Loading dashboard KPIs from the backend...");

    let config = BackendConfig::from_env()?;
    if let Some(warning) = config.config_error() {
        println!("⚠️  {}", warning);
        println!("   Every KPI will be zero until the variables are set.");
    }

    let service = KpiService::from_config(PostgrestClient::new(&config), &config);

    // 1. Table inspection
    println!("\n🔎 Tables:");
    for meta in service.inspect_tables().await {
        match (&meta.count, &meta.error) {
            (_, Some(error)) => println!("   {:<22} ❌ {}", meta.name, error),
            (count, None) => println!(
                "   {:<22} {} rows, columns: {}",
                meta.name,
                count.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string()),
                meta.columns.join(", ")
            ),
        }
    }

    // 2. Page snapshots
    let pages = [
        service.load_overview().await,
        service.load_sales_page().await,
        service.load_leads_page().await,
    ];

    for snapshot in &pages {
        println!("\n📊 {:?} page", snapshot.page);
        if snapshot.has_failures() {
            println!("   some KPIs failed, see the JSON output for details");
        }
        if let Some(sales) = &snapshot.sales {
            let totals = sales.value_or_default();
            println!(
                "   Sales  today R$ {:.2} | 7d R$ {:.2} | 15d R$ {:.2} | 30d R$ {:.2}",
                totals.today_total, totals.last7_total, totals.last15_total, totals.last30_total
            );
        }
        if let Some(leads) = &snapshot.new_leads {
            let counts = leads.value_or_default();
            println!(
                "   Leads  today {} | 7d {} | 15d {} | 30d {}",
                counts.today, counts.last7, counts.last15, counts.last30
            );
        }
        if let Some(attended) = &snapshot.attended_by_sector {
            for share in attended.value_or_default().shares() {
                println!(
                    "   {:<16} {:>5} ({:.1}%)",
                    share.label, share.count, share.percentage
                );
            }
        }
        if let Some(states) = &snapshot.clients_by_state {
            for (uf, tally) in states.value_or_default().ranked().into_iter().take(5) {
                println!(
                    "   {} {:>5} clients, {:.1}% reposição",
                    uf,
                    tally.total,
                    tally.reposition_rate()
                );
            }
        }
    }

    // 3. Persist snapshots and their schema
    let mut file = File::create("dashboard_snapshot.json")?;
    file.write_all(serde_json::to_string_pretty(&pages)?.as_bytes())?;
    println!("\n💾 Saved snapshots to dashboard_snapshot.json");

    let mut schema_file = File::create("dashboard_snapshot_schema.json")?;
    schema_file.write_all(DashboardSnapshot::schema_as_json()?.as_bytes())?;
    println!("💾 Saved JSON schema to dashboard_snapshot_schema.json");

    Ok(())
}
