use simfs::{self, NodeKind, Session};

pub fn main() {
    let mut session = Session::new();
    let config = simfs::ConfigBuilder::default()
        .with_block_size(32)
        .with_capacity(32 * 16)
        .build()
        .expect("Could not build configuration.");
    let fs = session.init_with(config).unwrap();

    fs.make_dir("/home").unwrap();
    fs.make_dir("/home/user").unwrap();
    fs.change_dir("/home/user").unwrap();
    fs.create_file("notes").unwrap();
    fs.create_file("todo").unwrap();

    let change = fs.append("notes", 50).unwrap();
    println!(
        "notes: {}B -> {}B, blocks {:?}",
        change.size_before, change.size_after, change.blocks
    );
    fs.append("todo", 40).unwrap();
    fs.append("notes", 70).unwrap();
    let change = fs.truncate("notes", 100).unwrap();
    println!("notes: {}B -> {}B, freed {:?}", change.size_before, change.size_after, change.blocks);

    for entry in fs.walk(Some("/")).unwrap() {
        let marker = if entry.kind == NodeKind::Directory { "/" } else { "" };
        println!("{}{}", entry.path, marker);
    }

    for report in fs.file_reports(Some("/")).unwrap() {
        println!("{} {}B {:?}", report.path, report.size, report.runs);
    }

    let disk = fs.disk_report();
    println!(
        "{} of {} blocks used in {} sectors, next block {}",
        disk.allocated_blocks,
        disk.total_blocks,
        disk.sectors.len(),
        disk.next_block
    );

    session.teardown().unwrap();
}
