#[cfg(test)]
mod tests {
    use crate::query::{MongoQuery, QueryHelper, QueryValue, MAX_PER_PAGE};
    use mongodb::bson::{doc, Bson};

    #[test]
    fn test_query_string_to_filter_and_cursor() {
        let helper = QueryHelper::parse(
            "?name=ta&gender=male&tags[]=a&tags[]=b&sort=age:-1&sort=name:1&project=name:1&page=3&per_page=5",
        );

        let mut query = MongoQuery::new(&helper);
        query
            .update_key_with("name", |value| doc! { "$regex": value, "$options": "i" })
            .update_key("gender")
            .update_key_with("tags", |value| doc! { "$in": value })
            .update_key("missing");

        assert_eq!(
            query.into_filter(),
            doc! {
                "name": { "$regex": "ta", "$options": "i" },
                "gender": "male",
                "tags": { "$in": ["a", "b"] },
            }
        );

        let option = helper.cursor_option();
        assert_eq!(option.sort, Some(doc! { "age": -1, "name": 1 }));
        assert_eq!(option.project, Some(doc! { "name": 1 }));
        assert_eq!(option.skip, 10);
        assert_eq!(option.limit, 5);
    }

    #[test]
    fn test_reserved_keys_never_reach_the_filter() {
        let helper = QueryHelper::parse("sort=a:1&project=b:1&page=2&per_page=3&status=open");
        let mut query = MongoQuery::new(&helper);
        query.all_filters();
        assert_eq!(query.filter(), &doc! { "status": "open" });
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let helper = QueryHelper::parse("name=&status=open");
        let mut query = MongoQuery::new(&helper);
        query.all_filters();
        assert_eq!(query.into_filter(), doc! { "status": "open" });
    }

    #[test]
    fn test_malformed_sort_tokens_are_dropped() {
        let helper = QueryHelper::parse("sort=name&sort=a:b:c&sort=age:up&sort=date:-1");
        assert_eq!(helper.cursor_option().sort, Some(doc! { "date": -1 }));

        let helper = QueryHelper::parse("sort=name");
        assert_eq!(helper.cursor_option().sort, None);
    }

    #[test]
    fn test_paging_defaults_and_bounds() {
        let option = QueryHelper::new().cursor_option();
        assert_eq!(option.skip, 0);
        assert_eq!(option.limit, 10);

        let option = QueryHelper::parse("page=0&per_page=-4").cursor_option();
        assert_eq!(option.skip, 0);
        assert_eq!(option.limit, 10);

        let option = QueryHelper::parse("page=2&per_page=5000").cursor_option();
        assert_eq!(option.limit, MAX_PER_PAGE as i64);
        assert_eq!(option.skip, MAX_PER_PAGE);
    }

    #[test]
    fn test_manually_built_helper() {
        let mut helper = QueryHelper::new();
        helper
            .insert("status", vec!["open", "closed"])
            .append("owner", "ann")
            .append("owner", "bob");

        assert_eq!(
            helper.get("owner"),
            Some(&QueryValue::Many(vec!["ann".to_string(), "bob".to_string()]))
        );

        let mut query = MongoQuery::new(&helper);
        query.update_key("status");
        assert_eq!(
            query.filter().get("status"),
            Some(&Bson::Array(vec![Bson::String("open".into()), Bson::String("closed".into())]))
        );
    }
}
