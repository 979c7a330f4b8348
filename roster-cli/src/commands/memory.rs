use roster_agent::Embedder;

use crate::error::Result;
use crate::local_provider::LocalHashEmbedder;
use crate::paths::Paths;
use crate::stores;

pub fn init(paths: &Paths) -> Result<()> {
    paths.ensure_data_dir()?;
    let _store = stores::open_memory(paths)?;
    println!("initialized {}", paths.memory_db().display());
    Ok(())
}

pub fn status(paths: &Paths) -> Result<()> {
    let store = stores::open_memory(paths)?;
    let counts = store.manager.counts()?;
    println!(
        "events: {}  entities: {}  edges: {}  facts: {}",
        counts.events, counts.entities, counts.edges, counts.facts
    );
    Ok(())
}

pub async fn search(paths: &Paths, query: String, top_k: usize) -> Result<()> {
    let store = stores::open_memory(paths)?;
    let embedder = LocalHashEmbedder::new(stores::EMBEDDING_DIM);
    let vector = embedder
        .embed(&query)
        .await
        .unwrap_or_else(|_| vec![0.0; stores::EMBEDDING_DIM]);
    let hits = store.manager.search_similar_entities(&vector, top_k, 0.0)?;
    if hits.is_empty() {
        println!("no entities found");
        return Ok(());
    }
    for (entity, score) in hits {
        println!("{:.3}  {} ({})", score, entity.canonical_name, entity.entity_type);
    }
    Ok(())
}

pub fn entities(paths: &Paths, limit: usize) -> Result<()> {
    let store = stores::open_memory(paths)?;
    for entity in store.manager.list_entities(limit)? {
        println!("{}  {} ({})  last_seen={}", entity.id, entity.canonical_name, entity.entity_type, entity.last_seen);
    }
    Ok(())
}

pub fn entity(paths: &Paths, name: String) -> Result<()> {
    let store = stores::open_memory(paths)?;
    let Some(entity) = store.manager.find_entity_by_name(&name)? else {
        return Err(roster_memory::MemoryError::NotFound(name).into());
    };
    println!("{} ({})  aliases: {:?}", entity.canonical_name, entity.entity_type, entity.aliases);
    for fact in store.manager.facts_about(&entity.id)? {
        println!("  {} {} {} (confidence {:.2}, source {})", fact.subject, fact.predicate, fact.object, fact.confidence, fact.source);
    }
    Ok(())
}

pub fn forget(paths: &Paths, name: String) -> Result<()> {
    let store = stores::open_memory(paths)?;
    store.manager.forget_entity(&name)?;
    println!("forgot {name}");
    Ok(())
}

pub fn doctor(paths: &Paths) -> Result<()> {
    let store = stores::open_memory(paths)?;
    let counts = store.manager.counts()?;
    let integrity = store.manager.integrity_check()?;
    println!(
        "events: {}  entities: {}  edges: {}  facts: {}\nintegrity_check: {}",
        counts.events, counts.entities, counts.edges, counts.facts, integrity
    );
    Ok(())
}
